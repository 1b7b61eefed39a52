//! Core types for compliance evaluation.
//!
//! These types flow through the whole pipeline: rule sets go in, one
//! [`Verdict`] per rule comes out, and the [`ComplianceSummary`] folds them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::{RuleSet, RuleSpec};
use crate::EvaluationError;

/// Reason used when a checker or the generative service gives none.
pub const NO_REASON_PROVIDED: &str = "No reason provided";

/// How much a failing rule matters to the overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Parse a severity name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state outcome of one rule.
///
/// Boolean producers only ever emit `Passed` or `Failed`; `Partial` comes
/// from generative judgments that report it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Passed,
    Partial,
    Failed,
}

impl VerdictStatus {
    /// Canonicalize a boolean result.
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    /// Parse one of `passed | partial | failed` (case-insensitive, trimmed).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "passed" => Some(Self::Passed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical per-rule result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Rule this verdict belongs to
    pub rule_id: String,

    /// Tri-state status
    pub status: VerdictStatus,

    /// Confidence in [0.0, 1.0], when the producer reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Human-readable explanation (never empty)
    pub reason: String,

    /// Evidentiary snippets or section references
    #[serde(default)]
    pub locations: Vec<String>,

    /// Copied from the rule
    pub severity: Severity,
}

impl Verdict {
    /// Create a verdict for a rule.
    ///
    /// An empty or whitespace-only reason is replaced by
    /// [`NO_REASON_PROVIDED`].
    pub fn new(rule: &RuleSpec, status: VerdictStatus, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            NO_REASON_PROVIDED.to_string()
        } else {
            reason
        };

        Self {
            rule_id: rule.id.clone(),
            status,
            confidence: None,
            reason,
            locations: Vec::new(),
            severity: rule.severity,
        }
    }

    /// Shorthand for a `failed` verdict.
    pub fn failed(rule: &RuleSpec, reason: impl Into<String>) -> Self {
        Self::new(rule, VerdictStatus::Failed, reason)
    }

    /// Attach a confidence, clamped to [0.0, 1.0]. NaN is dropped.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            None
        } else {
            Some(confidence.clamp(0.0, 1.0))
        };
        self
    }

    pub fn with_locations(mut self, locations: Vec<String>) -> Self {
        self.locations = locations;
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status.is_passed()
    }

    /// Whether this verdict counts against the overall status.
    pub fn is_critical_failure(&self) -> bool {
        self.severity == Severity::Critical && !self.is_passed()
    }
}

/// Which path produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    /// Regex / keyword / section checkers
    Deterministic,
    /// Normalized response from the generative service
    Generative,
    /// Keyword-overlap scoring after the service was unavailable
    Fallback,
}

impl fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deterministic => write!(f, "deterministic"),
            Self::Generative => write!(f, "generative"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// One entry of the report's `results` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    #[serde(flatten)]
    pub verdict: Verdict,

    /// Display name of the rule
    pub rule_name: String,

    /// `true` iff `status == passed`
    pub passed: bool,

    /// How the verdict was reached
    pub method: EvaluationMethod,
}

impl RuleOutcome {
    pub fn new(rule: &RuleSpec, verdict: Verdict, method: EvaluationMethod) -> Self {
        Self {
            passed: verdict.is_passed(),
            rule_name: rule.name.clone(),
            verdict,
            method,
        }
    }
}

/// Immutable per-document input to an evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    document_text: String,
    user_inputs: BTreeMap<String, String>,
    rule_set: Arc<RuleSet>,
}

impl EvaluationContext {
    /// Build a context for one document.
    ///
    /// Fails when the extracted text is empty: no rule is ever evaluated
    /// against unusable text.
    pub fn new(
        document_text: impl Into<String>,
        user_inputs: BTreeMap<String, String>,
        rule_set: Arc<RuleSet>,
    ) -> Result<Self, EvaluationError> {
        let document_text = document_text.into();
        if document_text.trim().is_empty() {
            return Err(EvaluationError::EmptyDocument);
        }

        Ok(Self {
            document_text,
            user_inputs,
            rule_set,
        })
    }

    pub fn document_text(&self) -> &str {
        &self.document_text
    }

    pub fn user_inputs(&self) -> &BTreeMap<String, String> {
        &self.user_inputs
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    pub fn rules(&self) -> &[RuleSpec] {
        &self.rule_set.rules
    }
}

/// Report-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    Pass,
    Fail,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Aggregate over all verdicts of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total: usize,
    pub passed_count: usize,
    pub partial_count: usize,
    pub failed_count: usize,

    /// Verdicts with severity=critical and status != passed
    pub critical_failures: usize,

    /// Verdicts with severity=high and status != passed
    pub high_failures: usize,

    /// passed / total * 100, two decimals; 0 when there are no rules
    pub compliance_score: f64,

    pub overall_status: OverallStatus,
}

/// Full output of one evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport {
    pub summary: ComplianceSummary,
    pub results: Vec<RuleOutcome>,
    pub evaluated_at: DateTime<Utc>,
}

impl ReviewReport {
    /// Build a report from outcomes in rule-set order.
    pub fn from_outcomes(results: Vec<RuleOutcome>) -> Self {
        let summary = crate::aggregator::aggregate(results.iter().map(|o| &o.verdict));
        Self {
            summary,
            results,
            evaluated_at: Utc::now(),
        }
    }

    /// Verdicts in rule-set order.
    pub fn verdicts(&self) -> impl Iterator<Item = &Verdict> {
        self.results.iter().map(|o| &o.verdict)
    }

    pub fn is_compliant(&self) -> bool {
        self.summary.overall_status == OverallStatus::Pass
    }
}
