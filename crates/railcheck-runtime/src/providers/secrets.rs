//! Secure credential handling for provider gateways.
//!
//! One type-safe path for API keys across all gateways. Using this module
//! ensures:
//!
//! - **No accidental logging**: Credentials cannot appear in Debug/Display output
//! - **Memory safety**: Credentials are zeroed on drop via the `secrecy` crate
//! - **Consistent patterns**: Gemini and OpenAI load keys the same way
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::{ApiCredential, CredentialSource};
//!
//! // Load from environment
//! let cred = ApiCredential::from_env("GOOGLE_API_KEY", "Google API key")?;
//!
//! // Load from config with env fallback
//! let cred = ApiCredential::from_config_or_env(&config, "api_key", "GOOGLE_API_KEY", "Google API key")?;
//!
//! // Use in a query parameter or header (explicit exposure)
//! url.query_pairs_mut().append_pair("key", cred.expose());
//! ```

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;

use super::GatewayError;

/// Where a credential was loaded from.
///
/// Useful for debugging configuration issues without exposing the actual
/// credential value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from configuration file/JSON
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// This wrapper provides:
/// - Safe Debug implementation that shows `[REDACTED]`
/// - Memory zeroing on drop via the `secrecy` crate
/// - Explicit exposure via `.expose()`
/// - Source tracking for debugging
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Create a credential from a string value.
    ///
    /// The value is immediately wrapped in a SecretString and cannot be
    /// accidentally logged after this point.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from an environment variable.
    ///
    /// # Arguments
    /// * `env_var` - Name of the environment variable
    /// * `name` - Human-readable name for error messages (e.g., "Google API key")
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, GatewayError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                GatewayError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Load a credential from JSON config, falling back to an environment
    /// variable.
    ///
    /// This is the recommended way to load credentials in gateway factories:
    /// 1. Check if `config_key` exists in the JSON config
    /// 2. If not, fall back to `env_var`
    /// 3. Return error if neither is set
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, GatewayError> {
        if let Some(value) = config[config_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(GatewayError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name, config_key, env_var
        )))
    }

    /// Check if a credential is available without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config[config_key].as_str().is_some() || std::env::var(env_var).is_ok()
    }

    /// Expose the credential value for use in an API call.
    ///
    /// # Security
    ///
    /// Only call this at the point where the credential is actually needed
    /// (e.g., building a request URL). Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Check if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    /// Get the source of this credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Get the human-readable name of this credential.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
