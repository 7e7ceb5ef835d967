//! Google Gemini gateway implementation.
//!
//! Talks to the v1beta `generateContent` and `models` endpoints. Supports
//! JSON-mode responses and search grounding per request.
//!
//! ## Security
//!
//! This gateway uses the centralized [`ApiCredential`] system for secure
//! credential handling. See the [`secrets`](super::secrets) module for
//! details.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use railcheck_core::RawResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    GatewayError, GenerationRequest, ModelDescriptor, ModelList, ProviderGateway,
};

/// Environment variable name for the Google API key.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini gateway.
///
/// # Security
///
/// The API key is stored using [`ApiCredential`] which:
/// - Cannot be accidentally printed via `Debug` or `Display`
/// - Is zeroed on drop
/// - Must be explicitly exposed via `.expose()` when needed
pub struct GeminiGateway {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiGateway {
    /// Create a new Gemini gateway.
    ///
    /// The API key is immediately wrapped in an [`ApiCredential`] and cannot
    /// be accidentally logged after construction.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Google API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, GatewayError> {
        let credential = ApiCredential::from_env(GOOGLE_API_KEY_ENV, "Google API key")?;
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create from JSON configuration with environment fallback.
    ///
    /// 1. Checks for `api_key` in the config
    /// 2. Falls back to `GOOGLE_API_KEY`
    /// 3. Returns an error if neither is set
    pub fn from_config(config: &JsonValue) -> Result<Self, GatewayError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            GOOGLE_API_KEY_ENV,
            "Google API key",
        )?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        Ok(Self {
            credential,
            base_url,
        })
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn get_client(&self) -> &reqwest::Client {
        static CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();
        CLIENT.get_or_init(|| {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client")
        })
    }
}

/// Gemini `generateContent` request format.
///
/// There is no separate system slot: the system prompt is folded into the
/// user turn, which works uniformly across v1beta model generations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    /// "user" on the way out; "model" in responses.
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![GeminiPart { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search_retrieval: EmptyObject,
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

/// Gemini `generateContent` response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    /// Absent when generation stopped before producing content.
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// Gemini `models` listing response format.
#[derive(Debug, Deserialize)]
struct GeminiModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModelEntry {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[async_trait]
impl ProviderGateway for GeminiGateway {
    async fn list_models(&self) -> Result<ModelList, GatewayError> {
        let client = self.get_client();

        // SECURITY: only expose the credential here, at the point of use
        let response = client
            .get(format!("{}/models", self.base_url))
            .query(&[("key", self.credential.expose())])
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), response).await);
        }

        let body: GeminiModelsResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        // Only gemini models that can serve generateContent are usable
        // for demos; the listing also carries embedding and legacy models.
        let mut models: Vec<ModelDescriptor> = body
            .models
            .into_iter()
            .filter(|m| {
                m.name.contains("gemini")
                    && m.supported_generation_methods
                        .iter()
                        .any(|method| method == "generateContent")
            })
            .map(|m| {
                let id = m
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(m.name.as_str())
                    .to_string();
                let mut descriptor = ModelDescriptor::new(id);
                if let Some(name) = m.display_name {
                    descriptor = descriptor.with_display_name(name);
                }
                descriptor
            })
            .collect();
        models.sort_by(|a, b| a.label().cmp(b.label()));

        let default_model = models
            .iter()
            .find(|m| m.id == DEFAULT_MODEL)
            .or_else(|| models.first())
            .map(|m| m.id.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(ModelList {
            models,
            default_model,
        })
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, GatewayError> {
        let client = self.get_client();

        let json_mode = wants_json_mode(request);
        let body = GeminiRequest {
            contents: vec![GeminiContent::text(compose_prompt(request, json_mode))],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: json_mode.then(|| "application/json".to_string()),
            },
            tools: request.web_search.then(|| {
                vec![GeminiTool {
                    google_search_retrieval: EmptyObject {},
                }]
            }),
        };

        // SECURITY: only expose the credential here, at the point of use
        let response = client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ))
            .query(&[("key", self.credential.expose())])
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(request.timeout)
                } else {
                    GatewayError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), response).await);
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        if let Some(reason) = body
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(GatewayError::ContentBlocked(format!(
                "prompt blocked ({})",
                reason
            )));
        }

        let Some(candidate) = body.candidates.into_iter().next() else {
            return Err(GatewayError::Parse(
                "response carries no candidates".to_string(),
            ));
        };
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(GatewayError::ContentBlocked(
                "candidate finished with SAFETY".to_string(),
            ));
        }

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(RawResponse::text(text))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Whether JSON mode should be requested. Only the 1.5 generation honors
/// `responseMimeType`.
fn wants_json_mode(request: &GenerationRequest) -> bool {
    request.structured_output && request.model.contains("gemini-1.5")
}

/// Fold the system prompt into the user turn and, in JSON mode, make sure
/// the text actually asks for JSON (the API rejects JSON mode otherwise).
fn compose_prompt(request: &GenerationRequest, json_mode: bool) -> String {
    let mut text = match &request.system {
        Some(system) => format!("{}\n\nUser Query: {}", system, request.prompt),
        None => request.prompt.clone(),
    };
    if json_mode && !mentions_json(request) {
        text.push_str("\n\nRespond strictly in JSON format.");
    }
    text
}

fn mentions_json(request: &GenerationRequest) -> bool {
    let in_prompt = request.prompt.to_lowercase().contains("json");
    let in_system = request
        .system
        .as_deref()
        .is_some_and(|s| s.to_lowercase().contains("json"));
    in_prompt || in_system
}

/// Map a non-success HTTP status to a gateway error, consuming the body.
async fn error_from_status(status: u16, response: reqwest::Response) -> GatewayError {
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return GatewayError::RateLimited { retry_after };
    }

    let message = response
        .json::<GeminiErrorBody>()
        .await
        .map(|b| b.error.message)
        .unwrap_or_else(|e| format!("unreadable error body: {}", e));

    match status {
        401 | 403 => GatewayError::Auth(message),
        _ => GatewayError::Api { status, message },
    }
}

/// Factory for creating Gemini gateways from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "AIza...",              // Optional, falls back to GOOGLE_API_KEY env
///   "base_url": "https://...",          // Optional, custom API endpoint
///   "model": "gemini-1.5-pro-latest"    // Optional, default model
/// }
/// ```
pub struct GeminiGatewayFactory;

impl ProviderFactory for GeminiGatewayFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn ProviderGateway>, GatewayError> {
        let gateway = GeminiGateway::from_config(config)?;
        Ok(Arc::new(gateway))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), GatewayError> {
        if !ApiCredential::is_available(config, "api_key", GOOGLE_API_KEY_ENV) {
            return Err(GatewayError::NotConfigured(format!(
                "Google API key required: set 'api_key' in config or {} env",
                GOOGLE_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(GatewayError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": DEFAULT_MODEL,
        })
    }

    fn description(&self) -> &'static str {
        "Google Gemini gateway with JSON mode and search grounding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_creation() {
        let gateway = GeminiGateway::new("test-key");
        assert_eq!(gateway.name(), "gemini");
        assert_eq!(gateway.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_factory_provider_type() {
        let factory = GeminiGatewayFactory;
        assert_eq!(factory.provider_type(), "gemini");
    }

    #[test]
    fn test_factory_default_config() {
        let factory = GeminiGatewayFactory;
        let config = factory.default_config();
        assert_eq!(config["model"], "gemini-1.5-pro-latest");
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let factory = GeminiGatewayFactory;
        let config = serde_json::json!({
            "api_key": "test-key",
            "base_url": "generativelanguage.googleapis.com"
        });
        assert!(factory.validate_config(&config).is_err());
    }

    #[test]
    fn test_request_serialization_includes_json_mode() {
        let request = GeminiRequest {
            contents: vec![GeminiContent::text("Return the user as JSON.")],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 1024,
                response_mime_type: Some("application/json".to_string()),
            },
            tools: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(
            value["contents"][0]["parts"][0]["text"],
            "Return the user as JSON."
        );
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_request_serialization_includes_search_tool() {
        let request = GeminiRequest {
            contents: vec![GeminiContent::text("What happened today?")],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 1024,
                response_mime_type: None,
            },
            tools: Some(vec![GeminiTool {
                google_search_retrieval: EmptyObject {},
            }]),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["tools"][0]["googleSearchRetrieval"],
            serde_json::json!({})
        );
    }

    fn request_for(model: &str, prompt: &str, structured: bool) -> GenerationRequest {
        GenerationRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            system: None,
            temperature: 0.7,
            max_tokens: 1024,
            web_search: false,
            structured_output: structured,
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_system_prompt_folds_into_user_turn() {
        let request =
            request_for("gemini-1.5-pro-latest", "Describe the user Alice.", false)
                .with_system("You are an information retrieval system.");
        let text = compose_prompt(&request, false);
        assert_eq!(
            text,
            "You are an information retrieval system.\n\nUser Query: Describe the user Alice."
        );
    }

    #[test]
    fn test_json_mode_only_for_gemini_15() {
        assert!(wants_json_mode(&request_for(
            "gemini-1.5-flash",
            "Return the user as JSON.",
            true
        )));
        assert!(!wants_json_mode(&request_for(
            "gemini-1.0-pro",
            "Return the user as JSON.",
            true
        )));
        assert!(!wants_json_mode(&request_for(
            "gemini-1.5-flash",
            "Return the user as JSON.",
            false
        )));
    }

    #[test]
    fn test_json_instruction_appended_when_prompt_never_mentions_json() {
        let request = request_for("gemini-1.5-pro-latest", "Describe the user Alice.", true);
        let text = compose_prompt(&request, true);
        assert!(text.ends_with("\n\nRespond strictly in JSON format."));

        let already_json =
            request_for("gemini-1.5-pro-latest", "Return the user as JSON.", true);
        let text = compose_prompt(&already_json, true);
        assert_eq!(text, "Return the user as JSON.");
    }

    #[test]
    fn test_safety_response_parses() {
        let raw = r#"{
            "candidates": [{"finishReason": "SAFETY"}]
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].finish_reason.as_deref(), Some("SAFETY"));
        assert!(parsed.candidates[0].content.is_none());
    }

    #[test]
    fn test_models_listing_parses_and_filters() {
        let raw = r#"{
            "models": [
                {
                    "name": "models/gemini-1.5-pro-latest",
                    "displayName": "Gemini 1.5 Pro",
                    "supportedGenerationMethods": ["generateContent", "countTokens"]
                },
                {
                    "name": "models/embedding-001",
                    "supportedGenerationMethods": ["embedContent"]
                },
                {
                    "name": "models/text-bison-001",
                    "supportedGenerationMethods": ["generateContent"]
                }
            ]
        }"#;
        let parsed: GeminiModelsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.models.len(), 3);
        let usable: Vec<_> = parsed
            .models
            .iter()
            .filter(|m| {
                m.name.contains("gemini")
                    && m.supported_generation_methods
                        .iter()
                        .any(|s| s == "generateContent")
            })
            .collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].name, "models/gemini-1.5-pro-latest");
    }

    // ==================== SECURITY TESTS ====================

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "AIza-super-secret-key-12345";
        let gateway = GeminiGateway::new(secret_key);

        let debug_output = format!("{:?}", gateway);
        assert!(
            !debug_output.contains(secret_key),
            "API key was exposed in Debug output!"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_config_with_api_key() {
        let config = serde_json::json!({
            "api_key": "config-api-key",
            "base_url": "https://custom.googleapis.com/v1beta"
        });

        let gateway = GeminiGateway::from_config(&config).unwrap();
        assert_eq!(gateway.base_url, "https://custom.googleapis.com/v1beta");
        assert_eq!(gateway.credential.expose(), "config-api-key");
        assert_eq!(gateway.credential.source(), CredentialSource::Config);
    }
}
