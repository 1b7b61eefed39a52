//! Deterministic checkers.
//!
//! Each checker is a pure function of a rule and the document text. They
//! are total: a malformed parameter produces a `failed` verdict with an
//! explanatory reason instead of an error, so one broken rule never aborts
//! the batch.

mod exact_match;
mod keyword;
mod section;

pub use exact_match::ExactMatchChecker;
pub use keyword::{KeywordChecker, NegativeKeywordChecker};
pub use section::SectionHeaderChecker;

use regex::{Regex, RegexBuilder};

use crate::rules::{CheckType, RuleSpec};
use crate::types::Verdict;

/// A deterministic check family.
pub trait Checker: Send + Sync {
    /// Which rule type this checker handles.
    fn check_type(&self) -> CheckType;

    /// Evaluate `rule` against `text`.
    fn evaluate(&self, rule: &RuleSpec, text: &str) -> Verdict;
}

/// Evaluate a deterministic rule, dispatching on its check type.
///
/// Generative rules never reach this layer through the engine; if one does
/// it is reported as `failed` rather than skipped.
pub fn evaluate(rule: &RuleSpec, text: &str) -> Verdict {
    let verdict = match rule.check_type() {
        CheckType::ExactMatch => ExactMatchChecker.evaluate(rule, text),
        CheckType::Keyword => KeywordChecker.evaluate(rule, text),
        CheckType::NegativeKeyword => NegativeKeywordChecker.evaluate(rule, text),
        CheckType::SectionHeader => SectionHeaderChecker.evaluate(rule, text),
        CheckType::Generative => Verdict::failed(rule, "Unknown check type"),
    };

    tracing::debug!(
        rule_id = %rule.id,
        check_type = %rule.check_type(),
        status = %verdict.status,
        "Deterministic rule evaluated"
    );

    verdict
}

/// Case-insensitive regex; `^`/`$` anchor to the whole text.
pub(crate) fn build_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Case-insensitive regex where `^`/`$` anchor to each line.
pub(crate) fn build_line_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
}

/// Non-blank keywords, trimmed, in configured order.
pub(crate) fn usable_keywords(keywords: &[String]) -> Vec<&str> {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::rules::{Check, RuleSpec};
    use crate::types::Severity;

    pub fn rule(check: Check, template: &str) -> RuleSpec {
        RuleSpec {
            id: "T-001".to_string(),
            name: "Test rule".to_string(),
            description: String::new(),
            severity: Severity::High,
            requires_input: false,
            input_key: None,
            check,
            explanation_template: template.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::rule;
    use super::*;
    use crate::rules::Check;
    use crate::types::VerdictStatus;

    #[test]
    fn test_generative_rule_is_not_silently_skipped() {
        let r = rule(
            Check::Generative {
                fallback_keywords: vec![],
            },
            "",
        );
        let verdict = evaluate(&r, "anything");
        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert_eq!(verdict.reason, "Unknown check type");
    }

    #[test]
    fn test_dispatch_by_check_type() {
        let r = rule(
            Check::SectionHeader {
                section_name: "Scope".to_string(),
            },
            "",
        );
        assert!(evaluate(&r, "# Scope\nText").is_passed());
    }
}
