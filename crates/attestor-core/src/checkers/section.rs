//! Section header checker.

use crate::checkers::{build_line_regex, Checker};
use crate::locations;
use crate::rules::{Check, CheckType, RuleSpec};
use crate::template;
use crate::types::{Verdict, VerdictStatus};

/// Passes iff the section name starts a line, or follows a markdown
/// heading (`#`) or bold (`*`) marker.
pub struct SectionHeaderChecker;

impl SectionHeaderChecker {
    fn header_pattern(section_name: &str) -> String {
        let name = regex::escape(section_name.trim());
        format!(r"^[ \t]*{name}|#+[ \t]*{name}|\*+[ \t]*{name}")
    }
}

impl Checker for SectionHeaderChecker {
    fn check_type(&self) -> CheckType {
        CheckType::SectionHeader
    }

    fn evaluate(&self, rule: &RuleSpec, text: &str) -> Verdict {
        let Check::SectionHeader { section_name } = &rule.check else {
            return Verdict::failed(rule, "Unknown check type");
        };

        if section_name.trim().is_empty() {
            return Verdict::failed(rule, "No section name configured");
        }

        let regex = match build_line_regex(&Self::header_pattern(section_name)) {
            Ok(regex) => regex,
            Err(e) => return Verdict::failed(rule, format!("Invalid section name: {}", e)),
        };

        let found = regex.find(text);
        let status = VerdictStatus::from_bool(found.is_some());

        let values = [("section_name", section_name.trim().to_string())];
        let reason = template::render_or(&rule.explanation_template, &values, || {
            if status.is_passed() {
                format!("Section '{}' found", section_name.trim())
            } else {
                format!("Section '{}' not found", section_name.trim())
            }
        });

        let locations = found
            .map(|m| vec![locations::line_snippet(text, m.start())])
            .unwrap_or_default();

        Verdict::new(rule, status, reason).with_locations(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::test_support::rule;

    fn section(name: &str) -> RuleSpec {
        rule(
            Check::SectionHeader {
                section_name: name.to_string(),
            },
            "",
        )
    }

    #[test]
    fn test_header_at_line_start() {
        let text = "Preamble\nIndependent Service Auditor's Report\nBody";
        let verdict = SectionHeaderChecker.evaluate(&section("Independent Service Auditor's Report"), text);

        assert_eq!(verdict.status, VerdictStatus::Passed);
        assert_eq!(verdict.locations, vec!["line 2: Independent Service Auditor's Report"]);
    }

    #[test]
    fn test_markdown_and_bold_markers() {
        let r = section("Opinion");
        assert!(SectionHeaderChecker.evaluate(&r, "intro\n## opinion\n").is_passed());
        assert!(SectionHeaderChecker.evaluate(&r, "see **Opinion** below").is_passed());
    }

    #[test]
    fn test_mid_sentence_mention_does_not_count() {
        let r = section("Opinion");
        let verdict = SectionHeaderChecker.evaluate(&r, "Our opinion is unqualified.");
        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert_eq!(verdict.reason, "Section 'Opinion' not found");
    }

    #[test]
    fn test_name_is_literal() {
        let r = section("Section 1.2 (Scope)");
        assert!(SectionHeaderChecker.evaluate(&r, "Section 1.2 (Scope)\n").is_passed());
        assert!(!SectionHeaderChecker.evaluate(&r, "Section 1x2 (Scope)\n").is_passed());
    }

    #[test]
    fn test_template_section_placeholder() {
        let mut r = section("Scope");
        r.explanation_template = "Expected a '{section_name}' section".to_string();
        let verdict = SectionHeaderChecker.evaluate(&r, "nothing here");
        assert_eq!(verdict.reason, "Expected a 'Scope' section");
    }
}
