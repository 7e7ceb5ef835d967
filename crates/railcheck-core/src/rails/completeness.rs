//! Empty/incomplete rail.
//!
//! The first question for any response: did the model actually answer?
//! Whitespace, nothing at all, and bodies shorter than the configured
//! minimum all fail here.

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::Validator;

#[derive(Debug, Default)]
pub struct CompletenessValidator;

impl CompletenessValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for CompletenessValidator {
    fn rail(&self) -> Rail {
        Rail::EmptyIncomplete
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        if response.is_empty() {
            return Verdict::fail(self.rail(), "response was empty or never arrived");
        }

        let Some(text) = response.flattened_text() else {
            return Verdict::pass(self.rail(), "structured response present");
        };

        let chars = text.chars().count();
        let min = config.completeness.min_chars;
        if chars < min {
            return Verdict::fail(
                self.rail(),
                format!(
                    "response is {} chars, shorter than the {}-char minimum",
                    chars, min
                ),
            )
            .with_evidence(vec![Evidence::from_response(text.clone(), 0, text.len())]);
        }

        Verdict::pass(self.rail(), format!("response carries {} chars", chars))
    }
}
