//! Model provider gateways for railcheck-runtime.
//!
//! This module defines the async trait the dispatcher talks to and the
//! gateway implementations for Google Gemini and OpenAI, each behind a
//! feature flag.
//!
//! ## Security
//!
//! All gateways use the [`secrets`] module for credential handling. See
//! [`ApiCredential`] for the recommended patterns.

use std::time::Duration;

use async_trait::async_trait;
use railcheck_core::{RawResponse, RequestContext};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "gemini")]
mod gemini;
#[cfg(feature = "openai")]
mod openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiGateway, GeminiGatewayFactory, GOOGLE_API_KEY_ENV};
#[cfg(feature = "openai")]
pub use openai::{OpenAiGateway, OpenAiGatewayFactory, OPENAI_API_KEY_ENV};

/// Errors from model provider gateways.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("response parse failed: {0}")]
    Parse(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("prompt blocked by provider: {0}")]
    ContentBlocked(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Whether this error is the dispatcher's timeout path.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout(_))
    }
}

/// One prompt on its way to a provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model to call.
    pub model: String,

    /// The user prompt.
    pub prompt: String,

    /// Optional system instruction.
    pub system: Option<String>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Ask the provider to ground the answer with web search.
    pub web_search: bool,

    /// Ask the provider to answer with a JSON document.
    pub structured_output: bool,

    /// Per-request deadline.
    pub timeout: Duration,
}

impl GenerationRequest {
    /// Build a request from a demo run's context.
    pub fn from_context(ctx: &RequestContext, timeout: Duration) -> Self {
        Self {
            model: ctx.model.clone(),
            prompt: ctx.prompt.clone(),
            system: None,
            temperature: ctx.params.temperature,
            max_tokens: ctx.params.max_tokens,
            web_search: ctx.options.web_search,
            structured_output: ctx.options.structured_output,
            timeout,
        }
    }

    /// Attach a system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// One model a provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Identifier to pass back in requests (e.g., `gemini-1.5-pro-latest`).
    pub id: String,

    /// Display name, when the provider reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Display name when present, id otherwise.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// The models a provider serves, plus the one to use when a demo does not
/// pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<ModelDescriptor>,
    pub default_model: String,
}

/// Gateway to one model provider.
///
/// This is the only place network calls to providers are made. The
/// validators in railcheck-core only ever see the returned text.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Models this provider currently serves.
    async fn list_models(&self) -> Result<ModelList, GatewayError>;

    /// Send one prompt and return the text that came back.
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, GatewayError>;

    /// Provider id for logs and history (e.g., "gemini").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use railcheck_core::{ModelParams, Rail, RequestOptions};

    #[test]
    fn test_request_from_context_carries_options_and_params() {
        let ctx = RequestContext::new(
            Rail::MismatchedJson,
            "Return the user as JSON.",
            "openai",
            "gpt-3.5-turbo",
        )
        .with_options(RequestOptions {
            structured_output: true,
            ..RequestOptions::default()
        })
        .with_params(ModelParams {
            temperature: 0.2,
            max_tokens: 256,
        });

        let request = GenerationRequest::from_context(&ctx, Duration::from_secs(30));
        assert_eq!(request.model, "gpt-3.5-turbo");
        assert_eq!(request.prompt, "Return the user as JSON.");
        assert!(request.structured_output);
        assert!(!request.web_search);
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.timeout, Duration::from_secs(30));
        assert!(request.system.is_none());
    }

    #[test]
    fn test_request_with_system() {
        let ctx = RequestContext::new(Rail::InvalidSql, "p", "gemini", "m");
        let request = GenerationRequest::from_context(&ctx, Duration::from_secs(5))
            .with_system("You write SQL only.");
        assert_eq!(request.system.as_deref(), Some("You write SQL only."));
    }

    #[test]
    fn test_model_descriptor_serialization_skips_missing_display_name() {
        let bare = serde_json::to_value(ModelDescriptor::new("gpt-4")).unwrap();
        assert!(bare.get("display_name").is_none());

        let named = serde_json::to_value(
            ModelDescriptor::new("gemini-1.5-pro-latest").with_display_name("Gemini 1.5 Pro"),
        )
        .unwrap();
        assert_eq!(named["display_name"], "Gemini 1.5 Pro");
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503 - overloaded");
        assert!(GatewayError::Timeout(Duration::from_secs(30)).is_timeout());
        assert!(!GatewayError::Auth("bad key".to_string()).is_timeout());
    }
}
