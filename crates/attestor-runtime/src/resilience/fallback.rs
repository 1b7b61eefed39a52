//! What a generative rule resolves to when the service cannot answer.

use serde::{Deserialize, Serialize};

use attestor_core::{EvaluationMethod, KeywordFallback, RuleSpec, Verdict};

/// Fallback strategy for unavailable services and unreadable responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Score the rule's fallback keywords against the document
    #[default]
    KeywordOverlap,

    /// Record the rule as failed with the diagnostic reason
    Fail,
}

impl FallbackStrategy {
    /// Resolve `rule` after the generative path gave up with `cause`.
    pub fn resolve(
        &self,
        rule: &RuleSpec,
        text: &str,
        scorer: &KeywordFallback,
        cause: &str,
    ) -> (Verdict, EvaluationMethod) {
        match self {
            Self::KeywordOverlap => (scorer.evaluate(rule, text), EvaluationMethod::Fallback),
            Self::Fail => (Verdict::failed(rule, cause), EvaluationMethod::Generative),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_core::{Check, Severity, VerdictStatus};

    fn rule() -> RuleSpec {
        RuleSpec {
            id: "G-1".to_string(),
            name: "Scope".to_string(),
            description: String::new(),
            severity: Severity::Medium,
            requires_input: false,
            input_key: None,
            check: Check::Generative {
                fallback_keywords: vec!["scope".to_string()],
            },
            explanation_template: String::new(),
        }
    }

    #[test]
    fn test_keyword_overlap_is_default() {
        let (verdict, method) = FallbackStrategy::default().resolve(
            &rule(),
            "The scope of this report",
            &KeywordFallback::new(),
            "connection refused",
        );
        assert_eq!(method, EvaluationMethod::Fallback);
        assert_eq!(verdict.status, VerdictStatus::Passed);
    }

    #[test]
    fn test_fail_strategy_keeps_cause() {
        let (verdict, method) = FallbackStrategy::Fail.resolve(
            &rule(),
            "The scope of this report",
            &KeywordFallback::new(),
            "Generative service unavailable: connection refused",
        );
        assert_eq!(method, EvaluationMethod::Generative);
        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert!(verdict.reason.contains("connection refused"));
    }

    #[test]
    fn test_strategy_deserializes_snake_case() {
        let strategy: FallbackStrategy = serde_json::from_str("\"keyword_overlap\"").unwrap();
        assert_eq!(strategy, FallbackStrategy::KeywordOverlap);
    }
}
