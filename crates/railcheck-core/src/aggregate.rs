//! Aggregation of validator verdicts into one verdict per run.
//!
//! The policy is fixed, not configurable:
//! 1. If ANY verdict is Fail, the run fails
//! 2. Else if ANY verdict is Inconclusive, the run is inconclusive
//! 3. Else the run passes
//!
//! Reasons and evidence are carried over only from the verdicts at the
//! winning severity, so a Fail is never diluted by the wording of checks
//! that passed.

use crate::types::{Outcome, Rail, Verdict};

/// Folds per-validator verdicts under worst-outcome-wins.
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Combine the verdicts from one run into a single verdict.
    ///
    /// An empty slate is Inconclusive: when no validator ran, nothing can
    /// be said to have passed.
    pub fn combine(&self, rail: Rail, verdicts: Vec<Verdict>) -> Verdict {
        if verdicts.is_empty() {
            return Verdict::inconclusive(rail, "no checks ran");
        }

        let worst = verdicts
            .iter()
            .map(|v| v.outcome)
            .fold(Outcome::Pass, Outcome::worst);

        let mut reasons = Vec::new();
        let mut evidence = Vec::new();
        for verdict in verdicts {
            if verdict.outcome == worst {
                reasons.push(verdict.reason);
                evidence.extend(verdict.evidence);
            }
        }

        Verdict {
            rail,
            outcome: worst,
            reason: reasons.join("; "),
            evidence,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Evidence;

    fn pass(reason: &str) -> Verdict {
        Verdict::pass(Rail::MismatchedJson, reason)
    }

    fn fail(reason: &str) -> Verdict {
        Verdict::fail(Rail::MismatchedJson, reason)
    }

    fn inconclusive(reason: &str) -> Verdict {
        Verdict::inconclusive(Rail::MismatchedJson, reason)
    }

    #[test]
    fn test_all_pass_passes() {
        let combined = Aggregator::new().combine(
            Rail::MismatchedJson,
            vec![pass("fields present"), pass("types declared")],
        );
        assert!(combined.is_pass());
        assert_eq!(combined.reason, "fields present; types declared");
    }

    #[test]
    fn test_single_fail_wins() {
        let combined = Aggregator::new().combine(
            Rail::MismatchedJson,
            vec![pass("fields present"), fail("age is a string")],
        );
        assert!(combined.is_fail());
        assert_eq!(combined.reason, "age is a string");
    }

    #[test]
    fn test_inconclusive_beats_pass_but_not_fail() {
        let a = Aggregator::new();

        let combined = a.combine(
            Rail::MismatchedJson,
            vec![pass("ok"), inconclusive("nothing to scan")],
        );
        assert_eq!(combined.outcome, Outcome::Inconclusive);

        let combined = a.combine(
            Rail::MismatchedJson,
            vec![inconclusive("nothing to scan"), fail("missing email")],
        );
        assert!(combined.is_fail());
        assert_eq!(combined.reason, "missing email");
    }

    #[test]
    fn test_evidence_kept_only_from_winning_severity() {
        let passing =
            pass("ok").with_evidence(vec![Evidence::from_response_body("healthy excerpt")]);
        let failing =
            fail("bad field").with_evidence(vec![Evidence::from_field("\"30\"", "age")]);
        let combined = Aggregator::new().combine(Rail::MismatchedJson, vec![passing, failing]);
        assert_eq!(combined.evidence.len(), 1);
        assert_eq!(combined.evidence[0].pointer, "response.age");
    }

    #[test]
    fn test_multiple_fail_reasons_join() {
        let combined = Aggregator::new().combine(
            Rail::MismatchedJson,
            vec![fail("missing email"), fail("age is a string")],
        );
        assert_eq!(combined.reason, "missing email; age is a string");
    }

    #[test]
    fn test_no_verdicts_is_inconclusive() {
        let combined = Aggregator::new().combine(Rail::InvalidSql, vec![]);
        assert_eq!(combined.outcome, Outcome::Inconclusive);
        assert_eq!(combined.reason, "no checks ran");
    }
}
