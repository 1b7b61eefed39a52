//! Keyword-overlap fallback for generative rules.
//!
//! Used when the generative service is unavailable or its response cannot
//! be read. Pure and total: it only looks at the rule's keywords and the
//! document text.

use crate::rules::RuleSpec;
use crate::types::{Verdict, VerdictStatus};

/// Fraction of keywords that must be present for the fallback to pass.
pub const PASS_THRESHOLD: f64 = 0.3;

/// How many matched keywords are quoted in the reason.
const REASON_SAMPLE: usize = 3;

/// Confidence-scored keyword overlap with the fixed [`PASS_THRESHOLD`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordFallback;

impl KeywordFallback {
    pub fn new() -> Self {
        Self
    }

    /// Score `rule` against `text`. Never produces `partial`.
    pub fn evaluate(&self, rule: &RuleSpec, text: &str) -> Verdict {
        let keywords: Vec<&str> = rule
            .fallback_keywords()
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Verdict::failed(rule, "No fallback keywords configured").with_confidence(0.0);
        }

        let haystack = text.to_lowercase();
        let matched: Vec<&str> = keywords
            .iter()
            .copied()
            .filter(|k| haystack.contains(&k.to_lowercase()))
            .collect();

        let confidence = matched.len() as f64 / keywords.len() as f64;
        let status = VerdictStatus::from_bool(confidence >= PASS_THRESHOLD);

        let sample = matched
            .iter()
            .take(REASON_SAMPLE)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        let reason = if sample.is_empty() {
            format!("Matched 0/{} keywords", keywords.len())
        } else {
            format!("Matched {}/{} keywords: {}", matched.len(), keywords.len(), sample)
        };

        tracing::debug!(
            rule_id = %rule.id,
            matched = matched.len(),
            total = keywords.len(),
            confidence,
            "Keyword fallback scored"
        );

        Verdict::new(rule, status, reason).with_confidence(confidence)
    }
}
