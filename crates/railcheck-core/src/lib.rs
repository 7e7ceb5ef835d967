//! # railcheck-core
//!
//! Deterministic guardrail validation engine for AI model output.
//!
//! This crate is the judgment half of Railcheck, answering:
//! - Did the response hold the shape the demo asked for?
//! - Does it contradict itself, invent entities, or leak restricted terms?
//! - What exactly failed, and where in the response?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same response, context, and config always produce
//!    the same verdict
//! 2. **Total**: Normalization never panics or errors; malformed input
//!    becomes an in-band parse flag
//! 3. **Empty never passes**: A blank or missing response cannot produce
//!    a Pass on any rail
//! 4. **Traceable**: Every Fail carries a reason and, where the data
//!    exists, evidence excerpts with pointers
//!
//! ## Example
//!
//! ```rust,ignore
//! use railcheck_core::{evaluate, Rail, RailConfig, RawResponse, RequestContext};
//!
//! let config = RailConfig::from_yaml_file("railconfig.yaml")?;
//! let ctx = RequestContext::new(
//!     Rail::InvalidSql,
//!     "Write a SQL query that returns all users over 25.",
//!     "gemini",
//!     "gemini-1.5-pro-latest",
//! );
//! let raw = RawResponse::text("SELECT * FROM users WHERE age > 25;");
//! let verdict = evaluate(&raw, &ctx, &config);
//! println!("{}: {}", verdict.outcome, verdict.reason);
//! ```

pub mod aggregate;
pub mod config;
pub mod evidence;
pub mod normalize;
pub mod rails;
pub mod report;
pub mod types;

// Re-export main types at crate root
pub use aggregate::Aggregator;
pub use config::{validate_config_schema, ConfigError, RailConfig};
pub use evidence::Evidence;
pub use normalize::{normalize, normalize_for_rail, strip_code_fences};
pub use rails::{
    BiasValidator, CompletenessValidator, ConfidenceValidator, ContradictionValidator,
    DataTypeValidator, GroundingValidator, JsonShapeValidator, SensitivityValidator,
    SqlValidator, TemporalValidator, TimeoutValidator, Validator, ValidatorRegistry,
};
pub use report::{format_entry, DisplayRecord};
pub use types::{
    summarize_prompt, EvidenceSource, ExpectedShape, FieldType, HistoryEntry, ModelParams,
    NormalizedResponse, Outcome, Rail, RawResponse, RequestContext, RequestOptions, Verdict,
    PROMPT_SUMMARY_CHARS,
};

/// Run every validator registered for the context's rail and fold the
/// results into one verdict.
///
/// This is the main entry point for callers that hold a raw provider
/// response. Normalization, validator fan-out, and worst-outcome
/// aggregation happen in one step; the call cannot fail.
pub fn evaluate(raw: &RawResponse, ctx: &RequestContext, config: &RailConfig) -> Verdict {
    evaluate_with_registry(&ValidatorRegistry::standard(), raw, ctx, config)
}

/// [`evaluate`] against a caller-supplied registry.
pub fn evaluate_with_registry(
    registry: &ValidatorRegistry,
    raw: &RawResponse,
    ctx: &RequestContext,
    config: &RailConfig,
) -> Verdict {
    let normalized = normalize_for_rail(raw, ctx.rail);
    let verdicts: Vec<Verdict> = registry
        .validators_for(ctx.rail, ctx)
        .iter()
        .map(|validator| validator.evaluate(&normalized, ctx, config))
        .collect();
    Aggregator::new().combine(ctx.rail, verdicts)
}
