//! Rail configuration parsing from YAML/JSON.
//!
//! Every threshold and reference list the validators consult lives here.
//! [`RailConfig::default`] ships the demo dataset, so the engine works with
//! no configuration file at all.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FieldType;

/// Errors that can occur when loading a rail configuration.
///
/// These are fatal at startup; nothing in the engine raises them once
/// demos are running.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Empty/incomplete rail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletenessConfig {
    /// Shortest trimmed body that counts as an answer.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

fn default_min_chars() -> usize {
    5
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
        }
    }
}

/// Invalid-SQL rail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqlConfig {
    /// Statement verbs the rail accepts (compared case-insensitively).
    #[serde(default = "default_allowed_verbs")]
    pub allowed_verbs: Vec<String>,

    /// Reject `DELETE`/`UPDATE` statements that carry no `WHERE` clause.
    #[serde(default = "default_true")]
    pub require_where_for_mutations: bool,

    /// Accept responses containing more than one `;`-separated statement.
    #[serde(default)]
    pub allow_multiple_statements: bool,
}

fn default_allowed_verbs() -> Vec<String> {
    ["SELECT", "INSERT", "UPDATE", "DELETE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            allowed_verbs: default_allowed_verbs(),
            require_where_for_mutations: true,
            allow_multiple_statements: false,
        }
    }
}

/// Expected JSON shape for the mismatched-json and data-type rails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonShapeConfig {
    /// Required fields and the runtime type each must carry.
    #[serde(default = "default_required_fields")]
    pub required: BTreeMap<String, FieldType>,

    /// Tolerate keys beyond the required set.
    #[serde(default)]
    pub allow_extra_keys: bool,
}

fn default_required_fields() -> BTreeMap<String, FieldType> {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), FieldType::Number);
    fields.insert("name".to_string(), FieldType::String);
    fields.insert("age".to_string(), FieldType::Number);
    fields.insert("email".to_string(), FieldType::String);
    fields
}

impl Default for JsonShapeConfig {
    fn default() -> Self {
        Self {
            required: default_required_fields(),
            allow_extra_keys: false,
        }
    }
}

/// Reference data for the phantom-data rail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceConfig {
    /// Entities a grounded response may name.
    #[serde(default = "default_known_entities")]
    pub known_entities: Vec<String>,

    /// Phrases that mark an honest no-data answer.
    #[serde(default = "default_disclaimer_phrases")]
    pub disclaimer_phrases: Vec<String>,
}

fn default_known_entities() -> Vec<String> {
    [
        "Alice Wonderland",
        "Bob The Builder",
        "Charlie Brown",
        "Diana Prince",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_disclaimer_phrases() -> Vec<String> {
    [
        "no record",
        "no information",
        "don't know",
        "do not know",
        "don't have information",
        "cannot find",
        "not found",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            known_entities: default_known_entities(),
            disclaimer_phrases: default_disclaimer_phrases(),
        }
    }
}

/// Temporal rail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemporalConfig {
    /// Days past today a date may land before it counts as future.
    #[serde(default)]
    pub tolerance_days: u32,
}

/// Contradiction rail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContradictionConfig {
    /// Statement pairs that cannot both hold in one response.
    #[serde(default = "default_exclusivity_pairs")]
    pub exclusivity_pairs: Vec<(String, String)>,

    /// Hedging keywords that suggest, but do not prove, a contradiction.
    #[serde(default = "default_negation_keywords")]
    pub negation_keywords: Vec<String>,

    /// Keyword occurrences needed before the rail reports Inconclusive.
    #[serde(default = "default_min_keyword_hits")]
    pub min_keyword_hits: usize,
}

fn default_exclusivity_pairs() -> Vec<(String, String)> {
    vec![
        ("active".to_string(), "closed".to_string()),
        ("open".to_string(), "no open".to_string()),
    ]
}

fn default_negation_keywords() -> Vec<String> {
    ["contradiction", "conflicting", "inconsistent", "however", "but"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_keyword_hits() -> usize {
    1
}

impl Default for ContradictionConfig {
    fn default() -> Self {
        Self {
            exclusivity_pairs: default_exclusivity_pairs(),
            negation_keywords: default_negation_keywords(),
            min_keyword_hits: default_min_keyword_hits(),
        }
    }
}

/// Bias rail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiasConfig {
    /// Terms whose accumulation suggests stereotyped framing.
    #[serde(default = "default_indicator_terms")]
    pub indicator_terms: Vec<String>,

    /// Total occurrences at which the rail fails.
    #[serde(default = "default_frequency_threshold")]
    pub frequency_threshold: usize,
}

fn default_indicator_terms() -> Vec<String> {
    [
        "men", "women", "male", "female", "typical", "always", "never", "naturally",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_frequency_threshold() -> usize {
    5
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            indicator_terms: default_indicator_terms(),
            frequency_threshold: default_frequency_threshold(),
        }
    }
}

/// Confidence rail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceConfig {
    /// Lowest self-reported score that still passes.
    #[serde(default = "default_confidence_minimum")]
    pub minimum: f64,
}

fn default_confidence_minimum() -> f64 {
    0.8
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            minimum: default_confidence_minimum(),
        }
    }
}

/// Sensitivity rail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensitivityConfig {
    /// Terms a response must not touch.
    #[serde(default = "default_sensitive_terms")]
    pub terms: Vec<String>,
}

fn default_sensitive_terms() -> Vec<String> {
    ["hate", "violence", "illegal", "explicit", "controversial"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            terms: default_sensitive_terms(),
        }
    }
}

/// A complete rail configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RailConfig {
    /// Version of this configuration (semver).
    pub config_version: String,

    /// Human-readable name.
    pub name: String,

    /// Detailed description.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub completeness: CompletenessConfig,

    #[serde(default)]
    pub sql: SqlConfig,

    /// Expected JSON shape (the `schema` section of the file).
    #[serde(default, rename = "schema")]
    pub json_shape: JsonShapeConfig,

    #[serde(default)]
    pub reference: ReferenceConfig,

    #[serde(default)]
    pub temporal: TemporalConfig,

    #[serde(default)]
    pub contradiction: ContradictionConfig,

    #[serde(default)]
    pub bias: BiasConfig,

    #[serde(default)]
    pub confidence: ConfidenceConfig,

    #[serde(default)]
    pub sensitivity: SensitivityConfig,
}

impl Default for RailConfig {
    /// The built-in demo configuration. Valid by construction.
    fn default() -> Self {
        Self {
            config_version: "1.0".to_string(),
            name: "Railcheck demo defaults".to_string(),
            description: None,
            completeness: CompletenessConfig::default(),
            sql: SqlConfig::default(),
            json_shape: JsonShapeConfig::default(),
            reference: ReferenceConfig::default(),
            temporal: TemporalConfig::default(),
            contradiction: ContradictionConfig::default(),
            bias: BiasConfig::default(),
            confidence: ConfidenceConfig::default(),
            sensitivity: SensitivityConfig::default(),
        }
    }
}

impl RailConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RailConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RailConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Validate thresholds and reference data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingField("name".to_string()));
        }

        if self.config_version.is_empty() {
            return Err(ConfigError::MissingField("config_version".to_string()));
        }

        if self.completeness.min_chars == 0 {
            return Err(ConfigError::ValidationError(
                "completeness.min_chars must be at least 1".to_string(),
            ));
        }

        if self.sql.allowed_verbs.is_empty() {
            return Err(ConfigError::ValidationError(
                "sql.allowed_verbs must name at least one verb".to_string(),
            ));
        }

        if self.sql.allowed_verbs.iter().any(|v| v.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "sql.allowed_verbs entries must be non-empty".to_string(),
            ));
        }

        if self.json_shape.required.keys().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "schema.required field names must be non-empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.confidence.minimum) {
            return Err(ConfigError::ValidationError(format!(
                "confidence.minimum must lie in [0.0, 1.0], got {}",
                self.confidence.minimum
            )));
        }

        if self.bias.frequency_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "bias.frequency_threshold must be at least 1".to_string(),
            ));
        }

        if self.contradiction.min_keyword_hits == 0 {
            return Err(ConfigError::ValidationError(
                "contradiction.min_keyword_hits must be at least 1".to_string(),
            ));
        }

        for (a, b) in &self.contradiction.exclusivity_pairs {
            if a.trim().is_empty() || b.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "contradiction.exclusivity_pairs entries must be non-empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
