//! Runtime configuration.
//!
//! The runtime reads the `runtime:` section of the same YAML file that
//! carries the rail thresholds. `railcheck_core::RailConfig` ignores that
//! key, and this module ignores everything else, so one file configures
//! both crates.
//!
//! Durations are humantime strings ("30s", "5m") rather than bare numbers,
//! so a config file reads the way an operator would say it.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use railcheck_core::config::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Runtime settings for provider calls and the model catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Deadline for one provider call
    #[serde(with = "duration_str")]
    pub provider_timeout: Duration,

    /// How long a cached model listing stays fresh
    #[serde(with = "duration_str")]
    pub model_cache_ttl: Duration,

    /// Maximum cached model listings
    pub model_cache_capacity: u64,

    /// Per-provider configuration blocks, keyed by provider id
    pub providers: BTreeMap<String, JsonValue>,
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            model_cache_ttl: Duration::from_secs(300),
            model_cache_capacity: 64,
            providers: BTreeMap::new(),
        }
    }
}

/// Wrapper that picks the `runtime:` key out of a combined config file.
#[derive(Debug, Deserialize)]
struct RuntimeSection {
    #[serde(default)]
    runtime: RuntimeConfig,
}

impl RuntimeConfig {
    /// Load the runtime section from combined YAML.
    ///
    /// A file without a `runtime:` key yields the defaults.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, ConfigError> {
        let section: RuntimeSection = serde_yaml::from_str(yaml_str)?;
        section.runtime.validate()?;
        Ok(section.runtime)
    }

    /// Load the runtime section from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Semantic validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "runtime.provider_timeout must be greater than zero".to_string(),
            ));
        }
        if self.model_cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.model_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Configuration block for one provider, if the file carries one.
    pub fn provider_config(&self, provider_id: &str) -> Option<&JsonValue> {
        self.providers.get(provider_id)
    }
}
