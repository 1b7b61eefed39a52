//! Keyword presence and absence checkers.
//!
//! Keywords are regex-escaped before matching, so their text is literal.
//! Matching is case-insensitive substring search.

use regex::Regex;

use crate::checkers::{build_regex, usable_keywords, Checker};
use crate::locations;
use crate::rules::{Check, CheckType, RuleSpec};
use crate::template;
use crate::types::{Verdict, VerdictStatus};

/// Occurrences of the configured keywords in one document.
#[derive(Debug, Default)]
struct KeywordScan {
    /// Keywords seen at least once, in configured order
    found: Vec<String>,
    /// Sum of all occurrences
    total_occurrences: usize,
    /// Byte offsets of every occurrence
    offsets: Vec<usize>,
}

impl KeywordScan {
    fn run(keywords: &[&str], text: &str) -> Result<Self, regex::Error> {
        let mut scan = Self::default();
        for keyword in keywords {
            let regex: Regex = build_regex(&regex::escape(keyword))?;
            let before = scan.offsets.len();
            scan.offsets.extend(regex.find_iter(text).map(|m| m.start()));
            let count = scan.offsets.len() - before;

            if count > 0 {
                scan.total_occurrences += count;
                if !scan.found.iter().any(|f| f.eq_ignore_ascii_case(keyword)) {
                    scan.found.push(keyword.to_string());
                }
            }
        }
        Ok(scan)
    }

    fn found_list(&self) -> String {
        if self.found.is_empty() {
            "None".to_string()
        } else {
            self.found.join(", ")
        }
    }
}

/// Passes iff at least `required_count` distinct keywords appear.
pub struct KeywordChecker;

impl Checker for KeywordChecker {
    fn check_type(&self) -> CheckType {
        CheckType::Keyword
    }

    fn evaluate(&self, rule: &RuleSpec, text: &str) -> Verdict {
        let Check::Keyword {
            keywords,
            required_count,
        } = &rule.check
        else {
            return Verdict::failed(rule, "Unknown check type");
        };

        let keywords = usable_keywords(keywords);
        if keywords.is_empty() {
            return Verdict::failed(rule, "No keywords configured").with_confidence(0.0);
        }

        let scan = match KeywordScan::run(&keywords, text) {
            Ok(scan) => scan,
            Err(e) => return Verdict::failed(rule, format!("Invalid keyword: {}", e)),
        };

        let distinct = scan.found.len();
        let status = VerdictStatus::from_bool(distinct >= *required_count);
        let confidence = distinct as f64 / keywords.len() as f64;

        let values = [
            ("found_count", scan.total_occurrences.to_string()),
            ("found_keywords", scan.found_list()),
            ("required_count", required_count.to_string()),
        ];
        let reason = template::render_or(&rule.explanation_template, &values, || {
            format!(
                "Found {} of {} required keywords: {}",
                distinct,
                required_count,
                scan.found_list()
            )
        });

        Verdict::new(rule, status, reason)
            .with_confidence(confidence)
            .with_locations(locations::snippets(text, scan.offsets.iter().copied()))
    }
}

/// Passes iff the keywords occur at most `max_occurrences` times in total.
pub struct NegativeKeywordChecker;

impl Checker for NegativeKeywordChecker {
    fn check_type(&self) -> CheckType {
        CheckType::NegativeKeyword
    }

    fn evaluate(&self, rule: &RuleSpec, text: &str) -> Verdict {
        let Check::NegativeKeyword {
            keywords,
            max_occurrences,
        } = &rule.check
        else {
            return Verdict::failed(rule, "Unknown check type");
        };

        let keywords = usable_keywords(keywords);
        if keywords.is_empty() {
            return Verdict::failed(rule, "No keywords configured").with_confidence(0.0);
        }

        let scan = match KeywordScan::run(&keywords, text) {
            Ok(scan) => scan,
            Err(e) => return Verdict::failed(rule, format!("Invalid keyword: {}", e)),
        };

        let status = VerdictStatus::from_bool(scan.total_occurrences <= *max_occurrences);

        let values = [
            ("found_count", scan.total_occurrences.to_string()),
            ("found_keywords", scan.found_list()),
            ("required_count", max_occurrences.to_string()),
        ];
        let reason = template::render_or(&rule.explanation_template, &values, || {
            if status.is_passed() {
                format!(
                    "Prohibited keywords found {} time(s), limit {}",
                    scan.total_occurrences, max_occurrences
                )
            } else {
                format!(
                    "Prohibited keywords found {} time(s), limit {}: {}",
                    scan.total_occurrences,
                    max_occurrences,
                    scan.found_list()
                )
            }
        });

        Verdict::new(rule, status, reason)
            .with_locations(locations::snippets(text, scan.offsets.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::test_support::rule;
    use proptest::prelude::*;

    fn keyword_rule(keywords: &[&str], required_count: usize) -> RuleSpec {
        rule(
            Check::Keyword {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                required_count,
            },
            "Found {found_count} occurrence(s): {found_keywords}",
        )
    }

    fn negative_rule(keywords: &[&str], max_occurrences: usize) -> RuleSpec {
        rule(
            Check::NegativeKeyword {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                max_occurrences,
            },
            "",
        )
    }

    #[test]
    fn test_single_keyword_below_required_count() {
        let r = keyword_rule(&["encryption", "MFA", "firewall"], 2);
        let verdict = KeywordChecker.evaluate(&r, "All data at rest uses encryption.");

        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert_eq!(verdict.reason, "Found 1 occurrence(s): encryption");
        let confidence = verdict.confidence.unwrap();
        assert!((confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_distinct_keywords_reach_required_count() {
        let r = keyword_rule(&["encryption", "MFA", "firewall"], 2);
        let verdict = KeywordChecker.evaluate(&r, "Encryption everywhere.\nmfa enforced.");

        assert_eq!(verdict.status, VerdictStatus::Passed);
        assert_eq!(verdict.locations.len(), 2);
    }

    #[test]
    fn test_repeated_keyword_counts_once_toward_distinct() {
        let r = keyword_rule(&["encryption", "MFA"], 2);
        let verdict = KeywordChecker.evaluate(&r, "encryption encryption encryption");

        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert_eq!(verdict.reason, "Found 3 occurrence(s): encryption");
    }

    #[test]
    fn test_keywords_are_literal() {
        let r = keyword_rule(&["C++ (v2)"], 1);
        assert!(KeywordChecker.evaluate(&r, "built with c++ (V2)").is_passed());
        assert!(!KeywordChecker.evaluate(&r, "built with cc (v2)").is_passed());
    }

    #[test]
    fn test_empty_keywords_never_pass() {
        let r = keyword_rule(&[], 0);
        let verdict = KeywordChecker.evaluate(&r, "anything");
        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert_eq!(verdict.confidence, Some(0.0));

        let r = negative_rule(&["  "], 0);
        let verdict = NegativeKeywordChecker.evaluate(&r, "anything");
        assert_eq!(verdict.status, VerdictStatus::Failed);
    }

    #[test]
    fn test_negative_keyword_absent_passes() {
        let r = negative_rule(&["qualified opinion", "material weakness"], 0);
        let verdict = NegativeKeywordChecker.evaluate(&r, "Unqualified report.");
        assert_eq!(verdict.status, VerdictStatus::Passed);
        assert!(verdict.locations.is_empty());
    }

    #[test]
    fn test_negative_keyword_over_limit_fails() {
        let r = negative_rule(&["exception"], 1);
        let verdict = NegativeKeywordChecker.evaluate(&r, "Exception noted.\nAnother exception.");
        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert!(verdict.reason.contains("2 time(s)"));
    }

    proptest! {
        #[test]
        fn prop_keyword_status_follows_distinct_count(
            present in proptest::collection::vec(any::<bool>(), 1..6),
            required_count in 0usize..7,
        ) {
            let keywords: Vec<String> = (0..present.len()).map(|i| format!("kw{}x", i)).collect();
            let text: String = keywords
                .iter()
                .zip(&present)
                .filter(|(_, p)| **p)
                .map(|(k, _)| format!("{} ", k))
                .collect();
            let r = rule(Check::Keyword { keywords, required_count }, "");

            let verdict = KeywordChecker.evaluate(&r, &text);
            let distinct = present.iter().filter(|p| **p).count();

            prop_assert_ne!(verdict.status, VerdictStatus::Partial);
            prop_assert_eq!(verdict.is_passed(), distinct >= required_count);
        }

        #[test]
        fn prop_negative_keyword_status_follows_total(
            occurrences in 0usize..6,
            limit in 0usize..6,
        ) {
            let text = "flagged ".repeat(occurrences);
            let r = rule(
                Check::NegativeKeyword { keywords: vec!["flagged".to_string()], max_occurrences: limit },
                "",
            );
            let verdict = NegativeKeywordChecker.evaluate(&r, &text);
            prop_assert_eq!(verdict.is_passed(), occurrences <= limit);
        }
    }
}
