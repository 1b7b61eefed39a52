//! Prompts for generative rule judgments.
//!
//! Every prompt is one turn: the rule, an optional expected value, a
//! bounded document excerpt, and the required JSON output shape. Wording
//! lives here so it can change without touching the engine.

use lazy_static::lazy_static;
use regex::Regex;

use attestor_core::RuleSpec;

use crate::providers::ChatMessage;

lazy_static! {
    /// Rules about dates or audit periods get the date-aware prompt.
    static ref DATE_RULE: Regex = Regex::new(r"(?i)date|period").unwrap();
}

/// System prompt shared by every judgment.
pub const SYSTEM_PROMPT: &str = r#"You are a strict SOC report validator.
You check one rule at a time against the supplied document excerpt.
Judge only the rule you are given. Do not invent criteria.
If the excerpt does not contain enough evidence, the rule is not passed.
Respond with ONLY a JSON object. No markdown, no extra text."#;

const OUTPUT_SHAPE: &str = r#"You MUST respond with ONLY a valid JSON object in this exact format:
{"passed": true | false | "partial", "reason": "brief explanation", "location": "where in the document"}

JSON response:"#;

const DATE_INSTRUCTIONS: &str = r#"IMPORTANT INSTRUCTIONS FOR DATES:
1. Find the exact text in the document containing the dates
2. Dates with the same meaning pass even if formatted differently
   ("30 Jun", "30th June", "June 30" all mean June 30)
3. Year, month and day must match semantically, not character by character
4. Report where in the document you found the dates"#;

const VALUE_INSTRUCTIONS: &str = r#"IMPORTANT INSTRUCTIONS:
1. Find the exact text in the document that relates to this rule
2. Names must match exactly (spelling, capitalization, punctuation)
3. Report types are stated on the title page and header (SOC 1/SOC 2, Type I/Type II)
4. Report where in the document you found this information"#;

/// Which prompt a rule gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Does the document satisfy the rule?
    Generic,
    /// Does the document state the expected value?
    ExpectedValue,
    /// Expected value is a date or audit period
    DateAware,
}

impl PromptKind {
    pub fn for_rule(rule: &RuleSpec, expected: Option<&str>) -> Self {
        if expected.is_none() {
            return Self::Generic;
        }

        let key = rule.input_key.as_deref().unwrap_or_default();
        if DATE_RULE.is_match(key) || DATE_RULE.is_match(&rule.name) {
            Self::DateAware
        } else {
            Self::ExpectedValue
        }
    }
}

/// Build the messages for one rule judgment.
pub fn build_messages(rule: &RuleSpec, excerpt: &str, expected: Option<&str>) -> Vec<ChatMessage> {
    let kind = PromptKind::for_rule(rule, expected);

    let mut prompt = String::new();
    match kind {
        PromptKind::Generic => {}
        PromptKind::ExpectedValue => {
            prompt.push_str(VALUE_INSTRUCTIONS);
            prompt.push_str("\n\n");
        }
        PromptKind::DateAware => {
            prompt.push_str(DATE_INSTRUCTIONS);
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str(&format!("Rule: {}\n", rule.name));
    if !rule.description.trim().is_empty() {
        prompt.push_str(&format!("Task: {}\n", rule.description.trim()));
    }
    if let Some(expected) = expected {
        prompt.push_str(&format!("Expected Value: \"{}\"\n", expected));
    }

    prompt.push_str("\nDocument Content:\n");
    prompt.push_str(excerpt);
    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_SHAPE);

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor_core::{Check, Severity};

    fn rule(name: &str, input_key: Option<&str>) -> RuleSpec {
        RuleSpec {
            id: "G-1".to_string(),
            name: name.to_string(),
            description: "Verify the report".to_string(),
            severity: Severity::High,
            requires_input: input_key.is_some(),
            input_key: input_key.map(str::to_string),
            check: Check::Generative {
                fallback_keywords: vec![],
            },
            explanation_template: String::new(),
        }
    }

    #[test]
    fn test_prompt_selection() {
        assert_eq!(PromptKind::for_rule(&rule("Opinion", None), None), PromptKind::Generic);
        assert_eq!(
            PromptKind::for_rule(&rule("Client name", Some("client_name")), Some("Acme")),
            PromptKind::ExpectedValue
        );
        assert_eq!(
            PromptKind::for_rule(&rule("Audit window", Some("audit_period_start")), Some("1 Jan 2025")),
            PromptKind::DateAware
        );
        assert_eq!(
            PromptKind::for_rule(&rule("Report Date", Some("report_as_of")), Some("30 June 2025")),
            PromptKind::DateAware
        );
    }

    #[test]
    fn test_messages_carry_rule_and_shape() {
        let messages = build_messages(&rule("Client name", Some("client_name")), "EXCERPT", Some("Acme"));

        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_system());

        let user = &messages[1].content;
        assert!(user.contains("Rule: Client name"));
        assert!(user.contains("Expected Value: \"Acme\""));
        assert!(user.contains("EXCERPT"));
        assert!(user.ends_with("JSON response:"));
        assert!(user.contains(r#""passed""#));
    }

    #[test]
    fn test_generic_prompt_has_no_expected_value() {
        let messages = build_messages(&rule("Opinion", None), "text", None);
        assert!(!messages[1].content.contains("Expected Value"));
        assert!(!messages[1].content.contains("INSTRUCTIONS"));
    }
}
