//! Gateway factory pattern for dynamic provider registration.
//!
//! New providers register factories that build gateways from JSON
//! configuration; nothing else needs to change when one is added.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = ProviderRegistry::new();
//! registry.register(Arc::new(GeminiGatewayFactory));
//!
//! let gateway = registry.create("gemini", &config)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{GatewayError, ProviderGateway};

/// Factory for creating provider gateways from configuration.
///
/// Each factory is responsible for:
/// 1. Validating its configuration format
/// 2. Creating gateway instances
/// 3. Providing a unique type identifier
pub trait ProviderFactory: Send + Sync {
    /// Unique identifier for this provider type.
    ///
    /// Examples: "gemini", "openai"
    fn provider_type(&self) -> &'static str;

    /// Create a gateway instance from JSON configuration.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn ProviderGateway>, GatewayError>;

    /// Validate configuration without creating a gateway.
    ///
    /// Use this for fast config validation during startup.
    fn validate_config(&self, config: &JsonValue) -> Result<(), GatewayError>;

    /// Default configuration for this provider.
    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    /// Human-readable description of this provider.
    fn description(&self) -> &'static str {
        "Model provider"
    }
}

/// Registry of available gateway factories.
///
/// Maps provider type names to their factories so gateways can be created
/// from configuration at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every gateway compiled in registered.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "gemini")]
        registry.register(Arc::new(super::GeminiGatewayFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiGatewayFactory));
        registry
    }

    /// Register a gateway factory.
    ///
    /// A factory with the same type replaces the existing one.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Create a gateway from type name and configuration.
    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn ProviderGateway>, GatewayError> {
        self.factories
            .get(provider_type)
            .ok_or_else(|| {
                GatewayError::NotConfigured(format!(
                    "unknown provider type '{}'; available: {:?}",
                    provider_type,
                    self.available_types()
                ))
            })?
            .create(config)
    }

    /// Validate configuration for a provider type.
    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), GatewayError> {
        self.factories
            .get(provider_type)
            .ok_or_else(|| {
                GatewayError::NotConfigured(format!("unknown provider type '{}'", provider_type))
            })?
            .validate_config(config)
    }

    /// List available provider types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a provider type is registered.
    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Get the factory for a provider type.
    pub fn get_factory(&self, provider_type: &str) -> Option<&Arc<dyn ProviderFactory>> {
        self.factories.get(provider_type)
    }

    /// Default configuration for a provider type.
    pub fn default_config(&self, provider_type: &str) -> Option<JsonValue> {
        self.factories
            .get(provider_type)
            .map(|f| f.default_config())
    }
}
