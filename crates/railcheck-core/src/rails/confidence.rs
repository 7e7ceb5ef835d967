//! Confidence-threshold rail.
//!
//! Looks for a self-reported confidence score in the response text and
//! compares it against the configured minimum. A response that never
//! states a score cannot be judged either way.

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::rails::patterns;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::Validator;

#[derive(Debug, Default)]
pub struct ConfidenceValidator;

impl ConfidenceValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for ConfidenceValidator {
    fn rail(&self) -> Rail {
        Rail::ConfidenceThreshold
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        let text = match response.flattened_text() {
            Some(text) if !response.is_empty() => text,
            _ => {
                return Verdict::inconclusive(
                    self.rail(),
                    "no text to scan for a confidence score",
                );
            }
        };

        let minimum = config.confidence.minimum;
        match patterns::extract_confidence(&text) {
            None => Verdict::inconclusive(
                self.rail(),
                "response does not state a confidence score",
            ),
            Some(found) if found.score < minimum => Verdict::fail(
                self.rail(),
                format!(
                    "stated confidence {:.2} is below the {:.2} minimum",
                    found.score, minimum
                ),
            )
            .with_evidence(vec![
                Evidence::from_response(found.text.clone(), found.start, found.end),
                Evidence::from_config(format!("{:.2}", minimum), "confidence.minimum"),
            ]),
            Some(found) => Verdict::pass(
                self.rail(),
                format!(
                    "stated confidence {:.2} meets the {:.2} minimum",
                    found.score, minimum
                ),
            ),
        }
    }
}
