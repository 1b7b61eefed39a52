//! Regex search checker.

use crate::checkers::{build_regex, Checker};
use crate::locations;
use crate::rules::{Check, CheckType, RuleSpec};
use crate::template;
use crate::types::{Verdict, VerdictStatus};

/// Sentinel reported as `{found_value}` when nothing matched.
pub const NOT_FOUND: &str = "Not found";

/// Passes iff the rule's pattern matches anywhere in the text.
pub struct ExactMatchChecker;

impl Checker for ExactMatchChecker {
    fn check_type(&self) -> CheckType {
        CheckType::ExactMatch
    }

    fn evaluate(&self, rule: &RuleSpec, text: &str) -> Verdict {
        let Check::ExactMatch { pattern } = &rule.check else {
            return Verdict::failed(rule, "Unknown check type");
        };

        let regex = match build_regex(pattern) {
            Ok(regex) => regex,
            Err(e) => return Verdict::failed(rule, format!("Invalid pattern '{}': {}", pattern, e)),
        };

        let first = regex.find(text);
        let found_value = first.map(|m| m.as_str().to_string());
        let status = VerdictStatus::from_bool(found_value.is_some());

        let values = [(
            "found_value",
            found_value.clone().unwrap_or_else(|| NOT_FOUND.to_string()),
        )];
        let reason = template::render_or(&rule.explanation_template, &values, || match &found_value {
            Some(value) => format!("Found '{}'", value),
            None => format!("Pattern '{}' not found", pattern),
        });

        let locations = locations::snippets(text, regex.find_iter(text).map(|m| m.start()));

        Verdict::new(rule, status, reason).with_locations(locations)
    }
}
