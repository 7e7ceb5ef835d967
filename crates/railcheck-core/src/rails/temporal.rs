//! Temporal rail.
//!
//! Scans response text for date mentions and fails when any of them land
//! beyond today plus the configured tolerance window. A model describing
//! events on dates that have not happened yet is presenting speculation
//! as record.

use chrono::{Datelike, Days, NaiveDate, Utc};

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::rails::patterns;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::Validator;

#[derive(Debug, Default)]
pub struct TemporalValidator;

impl TemporalValidator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate against a fixed calendar day. The trait impl feeds in the
    /// current day; tests pin one.
    fn evaluate_at(
        &self,
        today: NaiveDate,
        response: &NormalizedResponse,
        config: &RailConfig,
    ) -> Verdict {
        let text = match response.flattened_text() {
            Some(text) if !response.is_empty() => text,
            _ => {
                return Verdict::inconclusive(self.rail(), "no text to scan for dates");
            }
        };

        let horizon = today
            .checked_add_days(Days::new(u64::from(config.temporal.tolerance_days)))
            .unwrap_or(NaiveDate::MAX);
        let mentions = patterns::extract_dates(&text, today.year());
        if mentions.is_empty() {
            return Verdict::pass(self.rail(), "response mentions no dates");
        }

        let future: Vec<_> = mentions.iter().filter(|m| m.date > horizon).collect();
        if future.is_empty() {
            return Verdict::pass(
                self.rail(),
                format!(
                    "all {} mentioned dates fall on or before {}",
                    mentions.len(),
                    horizon
                ),
            );
        }

        let evidence = future
            .iter()
            .map(|m| Evidence::from_response(m.text.as_str(), m.start, m.end))
            .collect();
        Verdict::fail(
            self.rail(),
            format!(
                "response refers to dates beyond {}: {}",
                horizon,
                future
                    .iter()
                    .map(|m| m.text.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )
        .with_evidence(evidence)
    }
}

impl Validator for TemporalValidator {
    fn rail(&self) -> Rail {
        Rail::Temporal
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        self.evaluate_at(Utc::now().date_naive(), response, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawResponse;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    fn evaluate(body: &str) -> Verdict {
        evaluate_with(body, &RailConfig::default())
    }

    fn evaluate_with(body: &str, config: &RailConfig) -> Verdict {
        let response =
            crate::normalize::normalize_for_rail(&RawResponse::text(body), Rail::Temporal);
        TemporalValidator::new().evaluate_at(today(), &response, config)
    }

    #[test]
    fn test_past_dates_pass() {
        let verdict = evaluate("Account opened 2024-03-01 and last reviewed 2026-01-15.");
        assert!(verdict.is_pass());
        assert!(verdict.reason.contains("all 2 mentioned dates"));
    }

    #[test]
    fn test_future_date_fails() {
        let verdict = evaluate("Your order shipped and will arrive on 2031-01-15.");
        assert!(verdict.is_fail());
        assert!(verdict.reason.contains("2031-01-15"));
        assert_eq!(verdict.evidence.len(), 1);
        assert_eq!(verdict.evidence[0].excerpt, "2031-01-15");
        assert!(verdict.evidence[0].pointer.starts_with("response["));
    }

    #[test]
    fn test_today_is_not_future() {
        assert!(evaluate("Record updated 2026-08-24.").is_pass());
    }

    #[test]
    fn test_tolerance_window_admits_near_dates() {
        let config = RailConfig::from_yaml(
            "config_version: \"1.0\"\nname: \"Weekly\"\ntemporal:\n  tolerance_days: 7\n",
        )
        .unwrap();
        assert!(evaluate_with("Scheduled for 2026-08-30.", &config).is_pass());
        assert!(evaluate_with("Scheduled for 2026-09-05.", &config).is_fail());
    }

    #[test]
    fn test_two_digit_slash_year_is_resolved() {
        assert!(evaluate("Payment due 5/12/31.").is_fail());
    }

    #[test]
    fn test_month_name_date_with_year() {
        assert!(evaluate("The audit closes on January 10, 2031.").is_fail());
    }

    #[test]
    fn test_no_dates_pass() {
        let verdict = evaluate("The balance is current and nothing is scheduled.");
        assert!(verdict.is_pass());
        assert!(verdict.reason.contains("no dates"));
    }

    #[test]
    fn test_empty_is_inconclusive() {
        let ctx = RequestContext::new(
            Rail::Temporal,
            "When did the account open?",
            "gemini",
            "gemini-1.5-pro-latest",
        );
        let response = crate::normalize::normalize_for_rail(&RawResponse::text(""), Rail::Temporal);
        let verdict = TemporalValidator::new().evaluate(&response, &ctx, &RailConfig::default());
        assert!(verdict.outcome.is_inconclusive());
    }
}
