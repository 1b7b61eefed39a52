//! Rule-set parsing from JSON/YAML.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::schema::validate_rule_set_schema;
use crate::types::Severity;

/// Placeholder replaced by the user-supplied value in deterministic rules.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Errors that can occur when loading a rule set.
#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error("Failed to read rule set file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Rule set failed schema validation: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Unsupported rule set format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Rule {rule_id}: unknown check type '{check_type}'")]
    UnknownCheckType { rule_id: String, check_type: String },

    #[error("Rule {rule_id}: unknown severity '{severity}'")]
    UnknownSeverity { rule_id: String, severity: String },

    #[error("Rule {rule_id}: missing required field '{field}'")]
    MissingField { rule_id: String, field: String },

    #[error("Rule {rule_id}: {message}")]
    InvalidParameter { rule_id: String, message: String },

    #[error("Duplicate rule ID: {0}")]
    DuplicateRuleId(String),
}

/// The kind of check a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    ExactMatch,
    Keyword,
    NegativeKeyword,
    SectionHeader,
    Generative,
}

impl CheckType {
    /// Parse a check type name. `section` is accepted for `section_header`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact_match" => Some(Self::ExactMatch),
            "keyword" => Some(Self::Keyword),
            "negative_keyword" => Some(Self::NegativeKeyword),
            "section_header" | "section" => Some(Self::SectionHeader),
            "generative" => Some(Self::Generative),
            _ => None,
        }
    }

    pub fn is_deterministic(&self) -> bool {
        !matches!(self, Self::Generative)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::Keyword => "keyword",
            Self::NegativeKeyword => "negative_keyword",
            Self::SectionHeader => "section_header",
            Self::Generative => "generative",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific parameters of a rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check_type", rename_all = "snake_case")]
pub enum Check {
    /// Case-insensitive regex search
    ExactMatch { pattern: String },

    /// At least `required_count` distinct keywords must appear
    Keyword {
        keywords: Vec<String>,
        required_count: usize,
    },

    /// Total keyword occurrences must not exceed `max_occurrences`
    NegativeKeyword {
        keywords: Vec<String>,
        max_occurrences: usize,
    },

    /// A line must start with the section name (optionally after `#` or `*`)
    SectionHeader { section_name: String },

    /// Judged by the generative service; keywords only feed the fallback
    Generative { fallback_keywords: Vec<String> },
}

impl Check {
    pub fn check_type(&self) -> CheckType {
        match self {
            Self::ExactMatch { .. } => CheckType::ExactMatch,
            Self::Keyword { .. } => CheckType::Keyword,
            Self::NegativeKeyword { .. } => CheckType::NegativeKeyword,
            Self::SectionHeader { .. } => CheckType::SectionHeader,
            Self::Generative { .. } => CheckType::Generative,
        }
    }
}

/// One compliance check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSpec {
    /// Unique, stable identifier (e.g. "SOC-001")
    pub id: String,

    /// Display name
    pub name: String,

    /// What the rule verifies (also fed to the generative service)
    pub description: String,

    pub severity: Severity,

    /// Whether the rule consumes a user-supplied context value
    pub requires_input: bool,

    /// Name of that value in the evaluation context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_key: Option<String>,

    #[serde(flatten)]
    pub check: Check,

    /// Explanation with named placeholders such as `{found_value}`
    pub explanation_template: String,
}

impl RuleSpec {
    pub fn check_type(&self) -> CheckType {
        self.check.check_type()
    }

    pub fn is_generative(&self) -> bool {
        matches!(self.check, Check::Generative { .. })
    }

    /// Keywords used by the keyword-overlap fallback.
    pub fn fallback_keywords(&self) -> &[String] {
        match &self.check {
            Check::Generative { fallback_keywords } => fallback_keywords,
            Check::Keyword { keywords, .. } | Check::NegativeKeyword { keywords, .. } => keywords,
            Check::ExactMatch { .. } | Check::SectionHeader { .. } => &[],
        }
    }

    /// Look up the user value this rule requires.
    ///
    /// Returns `Ok(None)` for rules that need no input, and `Err` with a
    /// human-readable reason when a required value is missing or blank.
    pub fn required_input<'a>(
        &self,
        inputs: &'a BTreeMap<String, String>,
    ) -> Result<Option<&'a str>, String> {
        if !self.requires_input {
            return Ok(None);
        }

        let key = self.input_key.as_deref().unwrap_or_default();
        match inputs.get(key).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => Ok(Some(value)),
            _ => Err(format!("Required input '{}' was not provided", key)),
        }
    }

    /// Resolve the `{input}` placeholder of a deterministic rule.
    ///
    /// Patterns receive the regex-escaped value; keywords and section names
    /// receive it verbatim since the checkers escape them. Generative rules
    /// are returned unchanged (the value goes into the prompt instead).
    pub fn bind_inputs<'a>(
        &'a self,
        inputs: &BTreeMap<String, String>,
    ) -> Result<Cow<'a, RuleSpec>, String> {
        let Some(value) = self.required_input(inputs)? else {
            return Ok(Cow::Borrowed(self));
        };

        let check = match &self.check {
            Check::ExactMatch { pattern } if pattern.contains(INPUT_PLACEHOLDER) => {
                Check::ExactMatch {
                    pattern: pattern.replace(INPUT_PLACEHOLDER, &regex::escape(value)),
                }
            }
            Check::SectionHeader { section_name } if section_name.contains(INPUT_PLACEHOLDER) => {
                Check::SectionHeader {
                    section_name: section_name.replace(INPUT_PLACEHOLDER, value),
                }
            }
            Check::Keyword {
                keywords,
                required_count,
            } => Check::Keyword {
                keywords: substitute_all(keywords, value),
                required_count: *required_count,
            },
            Check::NegativeKeyword {
                keywords,
                max_occurrences,
            } => Check::NegativeKeyword {
                keywords: substitute_all(keywords, value),
                max_occurrences: *max_occurrences,
            },
            _ => return Ok(Cow::Borrowed(self)),
        };

        Ok(Cow::Owned(RuleSpec {
            check,
            ..self.clone()
        }))
    }
}

fn substitute_all(keywords: &[String], value: &str) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.replace(INPUT_PLACEHOLDER, value))
        .collect()
}

/// A loaded, validated rule set. Read-only after loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub rules: Vec<RuleSpec>,
}

/// On-disk rule-set document.
#[derive(Debug, Deserialize)]
struct RawRuleSet {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    version: Option<serde_json::Value>,

    #[serde(alias = "checks")]
    rules: Vec<RawRule>,
}

/// On-disk rule entry; field aliases keep older checklist files loadable.
#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(alias = "rule_id")]
    id: String,

    #[serde(default, alias = "rule_name")]
    name: Option<String>,

    #[serde(default)]
    description: String,

    check_type: String,

    #[serde(default, alias = "importance")]
    severity: Option<String>,

    #[serde(default)]
    requires_input: bool,

    #[serde(default)]
    input_key: Option<String>,

    #[serde(default, alias = "search_pattern")]
    pattern: Option<String>,

    #[serde(default)]
    keywords: Option<Vec<String>>,

    #[serde(default)]
    required_count: Option<usize>,

    #[serde(default)]
    section_name: Option<String>,

    #[serde(default)]
    fallback_keywords: Vec<String>,

    #[serde(default, alias = "explanation")]
    explanation_template: Option<String>,
}

impl TryFrom<RawRule> for RuleSpec {
    type Error = RuleSetError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let rule_id = raw.id.trim().to_string();
        if rule_id.is_empty() {
            return Err(RuleSetError::MissingField {
                rule_id: "<unnamed>".to_string(),
                field: "id".to_string(),
            });
        }

        let missing = |field: &str| RuleSetError::MissingField {
            rule_id: rule_id.clone(),
            field: field.to_string(),
        };
        let invalid = |message: String| RuleSetError::InvalidParameter {
            rule_id: rule_id.clone(),
            message,
        };

        let check_type =
            CheckType::parse(&raw.check_type).ok_or_else(|| RuleSetError::UnknownCheckType {
                rule_id: rule_id.clone(),
                check_type: raw.check_type.clone(),
            })?;

        let severity_text = raw.severity.ok_or_else(|| missing("severity"))?;
        let severity =
            Severity::parse(&severity_text).ok_or_else(|| RuleSetError::UnknownSeverity {
                rule_id: rule_id.clone(),
                severity: severity_text.clone(),
            })?;

        let input_key = raw
            .input_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if raw.requires_input && input_key.is_none() {
            return Err(missing("input_key"));
        }

        let check = match check_type {
            CheckType::ExactMatch => {
                let pattern = raw
                    .pattern
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| missing("pattern"))?;
                // `{input}` is not valid regex syntax; compile with a stand-in.
                let candidate = pattern.replace(INPUT_PLACEHOLDER, "input");
                RegexBuilder::new(&candidate)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| invalid(format!("invalid pattern: {}", e)))?;
                Check::ExactMatch { pattern }
            }
            CheckType::Keyword => Check::Keyword {
                keywords: raw.keywords.ok_or_else(|| missing("keywords"))?,
                required_count: raw.required_count.unwrap_or(1),
            },
            CheckType::NegativeKeyword => Check::NegativeKeyword {
                keywords: raw.keywords.ok_or_else(|| missing("keywords"))?,
                max_occurrences: raw.required_count.unwrap_or(0),
            },
            CheckType::SectionHeader => Check::SectionHeader {
                section_name: raw
                    .section_name
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| missing("section_name"))?,
            },
            CheckType::Generative => {
                let stray = [
                    ("pattern", raw.pattern.is_some()),
                    ("keywords", raw.keywords.is_some()),
                    ("required_count", raw.required_count.is_some()),
                    ("section_name", raw.section_name.is_some()),
                ];
                if let Some((field, _)) = stray.iter().find(|(_, present)| *present) {
                    return Err(invalid(format!(
                        "'{}' is not allowed on generative rules (use 'fallback_keywords')",
                        field
                    )));
                }
                Check::Generative {
                    fallback_keywords: raw.fallback_keywords,
                }
            }
        };

        if !raw.requires_input {
            if let Some(field) = placeholder_field(&check) {
                return Err(invalid(format!(
                    "'{}' uses {} but the rule does not set requires_input",
                    field, INPUT_PLACEHOLDER
                )));
            }
        }

        Ok(RuleSpec {
            name: raw
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| rule_id.clone()),
            id: rule_id,
            description: raw.description,
            severity,
            requires_input: raw.requires_input,
            input_key,
            check,
            explanation_template: raw.explanation_template.unwrap_or_default(),
        })
    }
}

/// The deterministic parameter that references `{input}`, if any.
fn placeholder_field(check: &Check) -> Option<&'static str> {
    match check {
        Check::ExactMatch { pattern } if pattern.contains(INPUT_PLACEHOLDER) => Some("pattern"),
        Check::SectionHeader { section_name } if section_name.contains(INPUT_PLACEHOLDER) => {
            Some("section_name")
        }
        Check::Keyword { keywords, .. } | Check::NegativeKeyword { keywords, .. }
            if keywords.iter().any(|k| k.contains(INPUT_PLACEHOLDER)) =>
        {
            Some("keywords")
        }
        _ => None,
    }
}

impl RuleSet {
    /// Build a rule set from already-constructed rules.
    pub fn new(rules: Vec<RuleSpec>) -> Result<Self, RuleSetError> {
        let rule_set = Self {
            name: None,
            version: None,
            rules,
        };
        rule_set.validate_unique_rule_ids()?;
        Ok(rule_set)
    }

    /// Parse a rule set from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, RuleSetError> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(document)
    }

    /// Parse a rule set from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleSetError> {
        let document: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(document)
    }

    /// Load a rule set file, choosing the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Self::from_json(&fs::read_to_string(path)?),
            "yaml" | "yml" => Self::from_yaml(&fs::read_to_string(path)?),
            _ => Err(RuleSetError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Validate and convert a parsed document.
    pub fn from_value(document: serde_json::Value) -> Result<Self, RuleSetError> {
        validate_rule_set_schema(&document).map_err(RuleSetError::SchemaError)?;

        let raw: RawRuleSet = serde_json::from_value(document)?;
        let rules = raw
            .rules
            .into_iter()
            .map(RuleSpec::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let rule_set = Self {
            name: raw.name,
            version: raw.version.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            rules,
        };
        rule_set.validate_unique_rule_ids()?;

        tracing::debug!(
            rules = rule_set.rules.len(),
            generative = rule_set.generative_count(),
            "Rule set loaded"
        );

        Ok(rule_set)
    }

    fn validate_unique_rule_ids(&self) -> Result<(), RuleSetError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(RuleSetError::DuplicateRuleId(rule.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, rule_id: &str) -> Option<&RuleSpec> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules judged by the generative service.
    pub fn generative_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_generative()).count()
    }

    /// Input keys the rule set consumes, sorted and deduplicated.
    pub fn input_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .rules
            .iter()
            .filter(|r| r.requires_input)
            .filter_map(|r| r.input_key.as_deref())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}
