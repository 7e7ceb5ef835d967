//! OpenAI gateway implementation.
//!
//! Talks to the `chat/completions` and `models` endpoints. Supports
//! JSON-mode responses; search grounding is a Gemini capability and the
//! flag is a no-op here.
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

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI gateway.
///
/// # Security
///
/// The API key is stored using [`ApiCredential`] which:
/// - Cannot be accidentally printed via `Debug` or `Display`
/// - Is zeroed on drop
/// - Must be explicitly exposed via `.expose()` when needed
pub struct OpenAiGateway {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for OpenAiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGateway")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiGateway {
    /// Create a new OpenAI gateway.
    ///
    /// The API key is immediately wrapped in an [`ApiCredential`] and cannot
    /// be accidentally logged after construction.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "OpenAI API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, GatewayError> {
        let credential = ApiCredential::from_env(OPENAI_API_KEY_ENV, "OpenAI API key")?;
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create from JSON configuration with environment fallback.
    ///
    /// 1. Checks for `api_key` in the config
    /// 2. Falls back to `OPENAI_API_KEY`
    /// 3. Returns an error if neither is set
    pub fn from_config(config: &JsonValue) -> Result<Self, GatewayError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            OPENAI_API_KEY_ENV,
            "OpenAI API key",
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

/// OpenAI `chat/completions` request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// OpenAI `chat/completions` response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

/// OpenAI `models` listing response format.
#[derive(Debug, Deserialize)]
struct OpenAiModelsResponse {
    #[serde(default)]
    data: Vec<OpenAiModelEntry>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModelEntry {
    id: String,
}

#[async_trait]
impl ProviderGateway for OpenAiGateway {
    async fn list_models(&self) -> Result<ModelList, GatewayError> {
        let client = self.get_client();

        // SECURITY: only expose the credential here, at the point of use
        let response = client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(self.credential.expose())
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), response).await);
        }

        let body: OpenAiModelsResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        // The listing mixes chat, embedding, and audio models; only the
        // gpt family serves chat/completions. Descending order puts the
        // newer generations first.
        let mut models: Vec<ModelDescriptor> = body
            .data
            .into_iter()
            .filter(|m| m.id.contains("gpt"))
            .map(|m| ModelDescriptor::new(m.id))
            .collect();
        models.sort_by(|a, b| b.id.cmp(&a.id));

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

        // chat/completions has no search grounding; request.web_search is
        // a no-op for this gateway.
        let body = ChatRequest {
            model: request.model.clone(),
            messages: build_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.structured_output.then(|| ResponseFormat {
                format_type: "json_object",
            }),
        };

        // SECURITY: only expose the credential here, at the point of use
        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
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

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let Some(choice) = body.choices.into_iter().next() else {
            return Err(GatewayError::Parse(
                "response carries no choices".to_string(),
            ));
        };
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(GatewayError::ContentBlocked(
                "choice finished with content_filter".to_string(),
            ));
        }

        Ok(RawResponse::text(choice.message.content.unwrap_or_default()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Build the message list. In JSON mode the API insists the conversation
/// mention JSON, so an instruction is appended when it does not.
fn build_messages(request: &GenerationRequest) -> Vec<ChatRequestMessage> {
    let mut messages = Vec::new();
    if let Some(system) = &request.system {
        messages.push(ChatRequestMessage {
            role: "system",
            content: system.clone(),
        });
    }

    let mut prompt = request.prompt.clone();
    if request.structured_output && !mentions_json(request) {
        prompt.push_str("\n\nRespond strictly in JSON format.");
    }
    messages.push(ChatRequestMessage {
        role: "user",
        content: prompt,
    });
    messages
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
        .json::<OpenAiErrorBody>()
        .await
        .map(|b| b.error.message)
        .unwrap_or_else(|e| format!("unreadable error body: {}", e));

    match status {
        401 | 403 => GatewayError::Auth(message),
        _ => GatewayError::Api { status, message },
    }
}

/// Factory for creating OpenAI gateways from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-...",           // Optional, falls back to OPENAI_API_KEY env
///   "base_url": "https://...",      // Optional, custom API endpoint
///   "model": "gpt-3.5-turbo"        // Optional, default model
/// }
/// ```
pub struct OpenAiGatewayFactory;

impl ProviderFactory for OpenAiGatewayFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn ProviderGateway>, GatewayError> {
        let gateway = OpenAiGateway::from_config(config)?;
        Ok(Arc::new(gateway))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), GatewayError> {
        if !ApiCredential::is_available(config, "api_key", OPENAI_API_KEY_ENV) {
            return Err(GatewayError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in config or {} env",
                OPENAI_API_KEY_ENV
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
        "OpenAI gateway with JSON-mode responses"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_creation() {
        let gateway = OpenAiGateway::new("test-key");
        assert_eq!(gateway.name(), "openai");
        assert_eq!(gateway.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_factory_provider_type() {
        let factory = OpenAiGatewayFactory;
        assert_eq!(factory.provider_type(), "openai");
    }

    #[test]
    fn test_factory_default_config() {
        let factory = OpenAiGatewayFactory;
        assert_eq!(factory.default_config()["model"], "gpt-3.5-turbo");
    }

    #[test]
    fn test_request_serialization_with_json_mode() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: "Respond with a JSON object.".to_string(),
                },
                ChatRequestMessage {
                    role: "user",
                    content: "Return the user as JSON.".to_string(),
                },
            ],
            temperature: 0.7,
            max_tokens: 1024,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Return the user as JSON.");
        assert_eq!(value["max_tokens"], 1024);
    }

    #[test]
    fn test_request_serialization_without_json_mode() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatRequestMessage {
                role: "user",
                content: "Hello.".to_string(),
            }],
            temperature: 0.7,
            max_tokens: 1024,
            response_format: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("response_format").is_none());
    }

    fn request_for(prompt: &str, structured: bool) -> GenerationRequest {
        GenerationRequest {
            model: "gpt-3.5-turbo".to_string(),
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
    fn test_json_instruction_appended_when_prompt_never_mentions_json() {
        let request = request_for("Describe the user Alice.", true);
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .content
            .ends_with("\n\nRespond strictly in JSON format."));

        let already_json = request_for("Return the user as JSON.", true);
        let messages = build_messages(&already_json);
        assert_eq!(messages[0].content, "Return the user as JSON.");
    }

    #[test]
    fn test_system_message_leads_the_conversation() {
        let request =
            request_for("Return the user as JSON.", false).with_system("You are a JSON data provider.");
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn test_content_filter_response_parses() {
        let raw = r#"{
            "choices": [{"message": {"content": null}, "finish_reason": "content_filter"}]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].finish_reason.as_deref(),
            Some("content_filter")
        );
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_models_listing_filters_to_gpt_family() {
        let raw = r#"{
            "data": [
                {"id": "gpt-3.5-turbo"},
                {"id": "gpt-4"},
                {"id": "whisper-1"},
                {"id": "text-embedding-ada-002"}
            ]
        }"#;
        let parsed: OpenAiModelsResponse = serde_json::from_str(raw).unwrap();
        let chat: Vec<_> = parsed.data.iter().filter(|m| m.id.contains("gpt")).collect();
        assert_eq!(chat.len(), 2);
    }

    // ==================== SECURITY TESTS ====================

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-super-secret-key-12345";
        let gateway = OpenAiGateway::new(secret_key);

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
            "base_url": "https://proxy.internal/v1"
        });

        let gateway = OpenAiGateway::from_config(&config).unwrap();
        assert_eq!(gateway.base_url, "https://proxy.internal/v1");
        assert_eq!(gateway.credential.expose(), "config-api-key");
        assert_eq!(gateway.credential.source(), CredentialSource::Config);
    }
}
