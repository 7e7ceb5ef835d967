//! JSON Schema validation for rail configurations.
//!
//! Configurations are validated against spec/railconfig.schema.json.
//! This module provides schema loading and validation utilities for
//! tooling that wants structural errors before serde ever runs.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded configuration schema (loaded at compile time).
const RAILCONFIG_SCHEMA_JSON: &str = include_str!("../../../../spec/railconfig.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema validation.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

/// Get or initialize the compiled schema validator.
fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(RAILCONFIG_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a configuration JSON value against the schema.
///
/// Returns `Ok(())` if valid, or the list of validation error messages.
pub fn validate_config_schema(config_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(config_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
