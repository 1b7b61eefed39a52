//! Aggregator: folds per-rule verdicts into a compliance summary.
//!
//! The overall-status policy is fixed:
//! 1. If ANY critical rule is not `passed` (failed OR partial) → FAIL
//! 2. Otherwise → PASS, including the vacuous case of no rules
//!
//! Aggregation is order-independent.

use crate::types::{ComplianceSummary, OverallStatus, Severity, Verdict, VerdictStatus};

/// Folds verdicts into a [`ComplianceSummary`].
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate a sequence of verdicts.
    pub fn aggregate<'a, I>(&self, verdicts: I) -> ComplianceSummary
    where
        I: IntoIterator<Item = &'a Verdict>,
    {
        let mut summary = ComplianceSummary {
            total: 0,
            passed_count: 0,
            partial_count: 0,
            failed_count: 0,
            critical_failures: 0,
            high_failures: 0,
            compliance_score: 0.0,
            overall_status: OverallStatus::Pass,
        };

        for verdict in verdicts {
            summary.total += 1;
            match verdict.status {
                VerdictStatus::Passed => summary.passed_count += 1,
                VerdictStatus::Partial => summary.partial_count += 1,
                VerdictStatus::Failed => summary.failed_count += 1,
            }

            if !verdict.is_passed() {
                match verdict.severity {
                    Severity::Critical => summary.critical_failures += 1,
                    Severity::High => summary.high_failures += 1,
                    Severity::Medium | Severity::Low => {}
                }
            }
        }

        summary.compliance_score = compliance_score(summary.passed_count, summary.total);
        if summary.critical_failures > 0 {
            summary.overall_status = OverallStatus::Fail;
        }

        summary
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate verdicts with the default aggregator.
pub fn aggregate<'a, I>(verdicts: I) -> ComplianceSummary
where
    I: IntoIterator<Item = &'a Verdict>,
{
    Aggregator::new().aggregate(verdicts)
}

/// Percentage of passed rules, rounded to two decimals.
fn compliance_score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let score = passed as f64 / total as f64 * 100.0;
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn verdict(severity: Severity, status: VerdictStatus) -> Verdict {
        Verdict {
            rule_id: "R".to_string(),
            status,
            confidence: None,
            reason: "r".to_string(),
            locations: vec![],
            severity,
        }
    }

    #[test]
    fn test_empty_is_vacuously_compliant() {
        let summary = aggregate(std::iter::empty::<&Verdict>());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.compliance_score, 0.0);
        assert_eq!(summary.overall_status, OverallStatus::Pass);
    }

    #[test]
    fn test_critical_partial_fails_report() {
        let verdicts = [
            verdict(Severity::Critical, VerdictStatus::Partial),
            verdict(Severity::Low, VerdictStatus::Passed),
        ];
        let summary = aggregate(&verdicts);

        assert_eq!(summary.critical_failures, 1);
        assert_eq!(summary.partial_count, 1);
        assert_eq!(summary.overall_status, OverallStatus::Fail);
    }

    #[test]
    fn test_high_failures_do_not_fail_report() {
        let verdicts = [
            verdict(Severity::High, VerdictStatus::Failed),
            verdict(Severity::Critical, VerdictStatus::Passed),
            verdict(Severity::Medium, VerdictStatus::Passed),
        ];
        let summary = aggregate(&verdicts);

        assert_eq!(summary.high_failures, 1);
        assert_eq!(summary.overall_status, OverallStatus::Pass);
        assert_eq!(summary.compliance_score, 66.67);
    }

    fn arb_verdict() -> impl Strategy<Value = Verdict> {
        let severity = prop_oneof![
            Just(Severity::Critical),
            Just(Severity::High),
            Just(Severity::Medium),
            Just(Severity::Low),
        ];
        let status = prop_oneof![
            Just(VerdictStatus::Passed),
            Just(VerdictStatus::Partial),
            Just(VerdictStatus::Failed),
        ];
        (severity, status).prop_map(|(severity, status)| verdict(severity, status))
    }

    proptest! {
        #[test]
        fn prop_counts_partition_total(verdicts in proptest::collection::vec(arb_verdict(), 0..40)) {
            let summary = aggregate(&verdicts);
            prop_assert_eq!(summary.total, verdicts.len());
            prop_assert_eq!(
                summary.total,
                summary.passed_count + summary.partial_count + summary.failed_count
            );
        }

        #[test]
        fn prop_overall_status_tracks_critical(verdicts in proptest::collection::vec(arb_verdict(), 0..40)) {
            let summary = aggregate(&verdicts);
            let any_critical = verdicts
                .iter()
                .any(|v| v.severity == Severity::Critical && v.status != VerdictStatus::Passed);
            prop_assert_eq!(summary.overall_status == OverallStatus::Fail, any_critical);
        }

        #[test]
        fn prop_order_independent(mut verdicts in proptest::collection::vec(arb_verdict(), 0..20)) {
            let forward = aggregate(&verdicts);
            verdicts.reverse();
            prop_assert_eq!(forward, aggregate(&verdicts));
        }
    }
}
