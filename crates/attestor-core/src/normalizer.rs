//! Response normalizer for generative judgments.
//!
//! Generative output is not schema-guaranteed. The normalizer tries a
//! strict parse first, then one pass of a fixed repair pipeline and a
//! single retry:
//!
//! 1. keep only the first fenced code block, if any
//! 2. slice from the first `{` to the last `}`
//! 3. collapse newlines, carriage returns and tabs to spaces
//!
//! [`parse_judgment`] reports why a response could not be read;
//! [`normalize`] never fails and turns that into a `failed` verdict.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::rules::RuleSpec;
use crate::types::{Verdict, VerdictStatus};

lazy_static! {
    /// First fenced block, optionally tagged (e.g. ```json). An unclosed
    /// fence runs to the end of the text.
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```[A-Za-z0-9_-]*(.*?)(?:```|\z)").unwrap();
}

const STATUS_KEYS: [&str; 3] = ["passed", "status", "satisfied"];
const REASON_KEYS: [&str; 3] = ["reason", "reasoning", "explanation"];

/// Why a generative response could not be read.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("empty response")]
    Empty,

    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("parse error: {0}")]
    Parse(String),
}

/// A generative judgment mapped onto the canonical verdict fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub status: VerdictStatus,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
    pub locations: Vec<String>,
}

impl Judgment {
    /// Attach this judgment to a rule.
    pub fn into_verdict(self, rule: &RuleSpec) -> Verdict {
        let verdict = Verdict::new(rule, self.status, self.reason.unwrap_or_default())
            .with_locations(self.locations);
        match self.confidence {
            Some(confidence) => verdict.with_confidence(confidence),
            None => verdict,
        }
    }
}

/// Parse a raw generative response.
pub fn parse_judgment(raw: &str) -> Result<Judgment, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Empty);
    }

    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(map_object(&object));
    }

    let repaired = repair(trimmed)?;
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(object)) => Ok(map_object(&object)),
        Ok(_) => Err(NormalizeError::Parse("expected a JSON object".to_string())),
        Err(e) => Err(NormalizeError::Parse(e.to_string())),
    }
}

/// Normalize a raw response into a verdict for `rule`. Never fails.
pub fn normalize(rule: &RuleSpec, raw: &str) -> Verdict {
    match parse_judgment(raw) {
        Ok(judgment) => judgment.into_verdict(rule),
        Err(e) => {
            tracing::warn!(rule_id = %rule.id, error = %e, "Unreadable generative response");
            Verdict::failed(rule, format!("Could not read generative response ({})", e))
        }
    }
}

/// Apply the repair pipeline, returning the candidate JSON text.
pub fn repair(text: &str) -> Result<String, NormalizeError> {
    let text = match FENCED_BLOCK.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => text,
    };

    let start = text.find('{').ok_or(NormalizeError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(NormalizeError::NoJsonObject)?;
    if end < start {
        return Err(NormalizeError::NoJsonObject);
    }

    Ok(text[start..=end].replace(['\n', '\r', '\t'], " "))
}

fn map_object(object: &Map<String, Value>) -> Judgment {
    let status = STATUS_KEYS
        .iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
        .map(status_from_value)
        .unwrap_or(VerdictStatus::Failed);

    let reason = REASON_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .filter(|r| !r.trim().is_empty())
        .map(str::to_string);

    let confidence = object.get("confidence").and_then(Value::as_f64);

    let locations = object
        .get("locations")
        .or_else(|| object.get("location"))
        .map(collect_locations)
        .unwrap_or_default();

    Judgment {
        status,
        reason,
        confidence,
        locations,
    }
}

fn status_from_value(value: &Value) -> VerdictStatus {
    match value {
        Value::Bool(b) => VerdictStatus::from_bool(*b),
        Value::String(s) => VerdictStatus::parse(s).unwrap_or(VerdictStatus::Failed),
        _ => VerdictStatus::Failed,
    }
}

fn collect_locations(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
