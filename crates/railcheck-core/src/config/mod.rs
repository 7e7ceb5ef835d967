//! Rail configuration parsing and validation.
//!
//! Rail configurations are structured data validated against JSON Schema.
//! This module handles parsing YAML/JSON configuration and validating it
//! before any demo runs; a bad configuration is fatal at startup, never
//! mid-run.

mod parser;
mod schema;

pub use parser::{
    BiasConfig, CompletenessConfig, ConfidenceConfig, ConfigError, ContradictionConfig,
    JsonShapeConfig, RailConfig, ReferenceConfig, SensitivityConfig, SqlConfig, TemporalConfig,
};
pub use schema::validate_config_schema;
