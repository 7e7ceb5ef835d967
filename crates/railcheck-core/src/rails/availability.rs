//! API-timeout rail.
//!
//! A response that reaches validation at all arrived inside the deadline;
//! requests that actually time out are failed upstream by the dispatcher
//! and never get here. This validator records the healthy case.

use crate::config::RailConfig;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::Validator;

#[derive(Debug, Default)]
pub struct TimeoutValidator;

impl TimeoutValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for TimeoutValidator {
    fn rail(&self) -> Rail {
        Rail::ApiTimeout
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        _config: &RailConfig,
    ) -> Verdict {
        if response.is_empty() {
            return Verdict::inconclusive(self.rail(), "no response arrived to time");
        }
        Verdict::pass(self.rail(), "provider answered within the deadline")
    }
}
