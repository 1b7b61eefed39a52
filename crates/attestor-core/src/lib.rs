//! # attestor-core
//!
//! Deterministic compliance rule evaluation and verdict reconciliation.
//!
//! This crate answers, for one document and one rule set:
//! - Which rules pass, partially pass, or fail?
//! - Why? (reason and evidence locations per rule)
//! - Is the document compliant overall?
//!
//! ## Key Guarantees
//!
//! 1. **One verdict per rule**: a broken rule degrades to `failed`, it never aborts the batch
//! 2. **No network**: generative rules are judged elsewhere (`attestor-runtime`);
//!    offline evaluation resolves them through the keyword fallback
//! 3. **Fail closed**: missing or unreadable data never defaults to `passed`
//! 4. **Configuration errors are fatal at load time**, not at evaluation time
//!
//! ## Example
//!
//! ```rust,ignore
//! use attestor_core::{evaluate, EvaluationContext, RuleSet};
//!
//! let rule_set = Arc::new(RuleSet::from_file("rules/soc2.json")?);
//! let ctx = EvaluationContext::new(text, inputs, rule_set)?;
//! let report = evaluate(&ctx);
//!
//! println!("{}: {}%", report.summary.overall_status, report.summary.compliance_score);
//! ```

pub mod aggregator;
pub mod checkers;
pub mod fallback;
pub mod locations;
pub mod normalizer;
pub mod rules;
pub mod template;
pub mod types;

// Re-export main types at crate root
pub use aggregator::{aggregate, Aggregator};
pub use checkers::Checker;
pub use fallback::KeywordFallback;
pub use normalizer::{normalize, parse_judgment, Judgment, NormalizeError};
pub use rules::{Check, CheckType, RuleSet, RuleSetError, RuleSpec};
pub use types::{
    ComplianceSummary, EvaluationContext, EvaluationMethod, OverallStatus, ReviewReport,
    RuleOutcome, Severity, Verdict, VerdictStatus, NO_REASON_PROVIDED,
};

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur before any rule is evaluated.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Rule set error: {0}")]
    RuleSet(#[from] RuleSetError),

    #[error("Document text is empty")]
    EmptyDocument,
}

/// Evaluate a deterministic rule, resolving its user input first.
///
/// A required input that is missing yields a `failed` verdict.
pub fn evaluate_deterministic(
    rule: &RuleSpec,
    text: &str,
    inputs: &BTreeMap<String, String>,
) -> Verdict {
    match rule.bind_inputs(inputs) {
        Ok(bound) => checkers::evaluate(&bound, text),
        Err(reason) => Verdict::failed(rule, reason),
    }
}

/// Evaluate one rule without the generative service.
///
/// Generative rules go straight to the keyword fallback.
pub fn evaluate_rule_offline(
    rule: &RuleSpec,
    text: &str,
    inputs: &BTreeMap<String, String>,
) -> RuleOutcome {
    if !rule.is_generative() {
        let verdict = evaluate_deterministic(rule, text, inputs);
        return RuleOutcome::new(rule, verdict, EvaluationMethod::Deterministic);
    }

    match rule.required_input(inputs) {
        Ok(_) => RuleOutcome::new(
            rule,
            KeywordFallback::new().evaluate(rule, text),
            EvaluationMethod::Fallback,
        ),
        Err(reason) => RuleOutcome::new(
            rule,
            Verdict::failed(rule, reason),
            EvaluationMethod::Generative,
        ),
    }
}

/// Evaluate every rule of the context offline, in rule-set order.
///
/// This is the reference sequential evaluation; `attestor-runtime` adds the
/// generative path on top of it.
pub fn evaluate(ctx: &EvaluationContext) -> ReviewReport {
    let results: Vec<RuleOutcome> = ctx
        .rules()
        .iter()
        .map(|rule| evaluate_rule_offline(rule, ctx.document_text(), ctx.user_inputs()))
        .collect();

    let report = ReviewReport::from_outcomes(results);
    tracing::info!(
        total = report.summary.total,
        passed = report.summary.passed_count,
        critical_failures = report.summary.critical_failures,
        overall = %report.summary.overall_status,
        "Offline evaluation complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const RULE_SET: &str = r#"
{
  "rules": [
    {
      "id": "SOC-001",
      "name": "Report type",
      "check_type": "exact_match",
      "severity": "critical",
      "pattern": "SOC\\s*2",
      "explanation_template": "Report type: {found_value}"
    },
    {
      "id": "SOC-002",
      "name": "Security controls",
      "check_type": "keyword",
      "severity": "high",
      "keywords": ["encryption", "MFA", "firewall"],
      "required_count": 2
    },
    {
      "id": "SOC-003",
      "name": "Client named",
      "check_type": "exact_match",
      "severity": "critical",
      "requires_input": true,
      "input_key": "client_name",
      "pattern": "prepared for {input}"
    },
    {
      "id": "SOC-004",
      "name": "Audit period",
      "check_type": "generative",
      "severity": "medium",
      "fallback_keywords": ["audit period", "examination", "attestation"]
    }
  ]
}
"#;

    fn context(text: &str, inputs: &[(&str, &str)]) -> EvaluationContext {
        let rule_set = Arc::new(RuleSet::from_json(RULE_SET).unwrap());
        let inputs = inputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EvaluationContext::new(text, inputs, rule_set).unwrap()
    }

    #[test]
    fn test_offline_evaluation_end_to_end() {
        let ctx = context(
            "This is a SOC 2 Type II report prepared for Acme Corp.\nData uses encryption.\nThe audit period is 2024.",
            &[("client_name", "Acme Corp")],
        );
        let report = evaluate(&ctx);

        let ids: Vec<&str> = report.results.iter().map(|o| o.verdict.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["SOC-001", "SOC-002", "SOC-003", "SOC-004"]);

        assert_eq!(report.results[0].verdict.reason, "Report type: SOC 2");
        assert!(!report.results[1].passed);
        assert!(report.results[2].passed);
        assert_eq!(report.results[3].method, EvaluationMethod::Fallback);
        assert!(report.results[3].passed);

        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.high_failures, 1);
        assert_eq!(report.summary.overall_status, OverallStatus::Pass);
        assert_eq!(report.summary.compliance_score, 75.0);
    }

    #[test]
    fn test_missing_input_fails_rule_not_run() {
        let ctx = context("SOC 2 report prepared for Acme Corp", &[]);
        let report = evaluate(&ctx);

        let outcome = &report.results[2];
        assert_eq!(outcome.verdict.status, VerdictStatus::Failed);
        assert_eq!(outcome.verdict.reason, "Required input 'client_name' was not provided");
        assert_eq!(report.summary.overall_status, OverallStatus::Fail);
    }

    #[test]
    fn test_report_serializes_results_payload() {
        let ctx = context("SOC 2", &[("client_name", "Acme")]);
        let json = serde_json::to_value(evaluate(&ctx)).unwrap();

        assert_eq!(json["summary"]["overall_status"], "FAIL");
        assert_eq!(json["results"][0]["rule_name"], "Report type");
        assert_eq!(json["results"][0]["passed"], true);
        assert!(json["results"][0]["locations"].is_array());
        assert!(json["evaluated_at"].is_string());
    }
}
