//! The guardrail validators.
//!
//! One validator per rail, each pure and independent: a validator sees the
//! normalized response, the request context, and the configuration, and
//! returns exactly one [`Verdict`]. No validator reads another's output;
//! composition happens through the [`ValidatorRegistry`] plus
//! worst-outcome aggregation.
//!
//! Empty input never passes: validators that have nothing to scan return
//! Inconclusive, and the completeness and parse-dependent rails fail
//! outright.

pub mod patterns;

mod availability;
mod completeness;
mod confidence;
mod content;
mod contradiction;
mod grounding;
mod json_shape;
mod sql;
mod temporal;
mod typing;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use availability::TimeoutValidator;
pub use completeness::CompletenessValidator;
pub use confidence::ConfidenceValidator;
pub use content::{BiasValidator, SensitivityValidator};
pub use contradiction::ContradictionValidator;
pub use grounding::GroundingValidator;
pub use json_shape::JsonShapeValidator;
pub use sql::SqlValidator;
pub use temporal::TemporalValidator;
pub use typing::DataTypeValidator;

use crate::config::RailConfig;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

/// A single guardrail check.
///
/// Implementations must be pure: same inputs, same verdict, no I/O.
pub trait Validator: Send + Sync {
    /// The rail this validator enforces.
    fn rail(&self) -> Rail;

    /// Judge a normalized response.
    fn evaluate(
        &self,
        response: &NormalizedResponse,
        ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict;
}

/// Maps rails to the validators that run for them.
///
/// Deterministic ordering via BTreeMap (not HashMap) so repeated runs
/// evaluate in the same order.
pub struct ValidatorRegistry {
    validators: BTreeMap<Rail, Vec<Arc<dyn Validator>>>,
}

impl ValidatorRegistry {
    /// A registry with no validators. Useful for tests.
    pub fn empty() -> Self {
        Self {
            validators: BTreeMap::new(),
        }
    }

    /// The standard wiring: every rail gets its own validator.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CompletenessValidator::new()));
        registry.register(Arc::new(SqlValidator::new()));
        registry.register(Arc::new(JsonShapeValidator::new()));
        registry.register(Arc::new(DataTypeValidator::new()));
        registry.register(Arc::new(TimeoutValidator::new()));
        registry.register(Arc::new(GroundingValidator::new()));
        registry.register(Arc::new(TemporalValidator::new()));
        registry.register(Arc::new(ContradictionValidator::new()));
        registry.register(Arc::new(BiasValidator::new()));
        registry.register(Arc::new(ConfidenceValidator::new()));
        registry.register(Arc::new(SensitivityValidator::new()));
        registry
    }

    /// Add a validator under its own rail.
    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators
            .entry(validator.rail())
            .or_default()
            .push(validator);
    }

    /// The validators to run for a rail in this context.
    ///
    /// A mismatched-json run that asked the provider for structured output
    /// also gets the data-type validator, so one demo can exercise both
    /// shape and typing.
    pub fn validators_for(&self, rail: Rail, ctx: &RequestContext) -> Vec<Arc<dyn Validator>> {
        let mut out = self
            .validators
            .get(&rail)
            .cloned()
            .unwrap_or_default();

        if rail == Rail::MismatchedJson && ctx.options.structured_output {
            if let Some(extra) = self.validators.get(&Rail::UnexpectedDataTypes) {
                out.extend(extra.iter().cloned());
            }
        }

        out
    }

    /// Rails with at least one validator registered.
    pub fn rails(&self) -> Vec<Rail> {
        self.validators.keys().copied().collect()
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Clip text to an evidence-sized excerpt on a char boundary.
pub(crate) fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
