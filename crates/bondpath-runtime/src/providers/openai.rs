//! OpenAI chat completions provider.
//!
//! Used as the secondary backend. Structured calls request a `json_schema`
//! response format; attachments are sent as `image_url` data URLs.

use super::{
    factory::{base_url, ProviderFactory},
    secrets::{ApiCredential, KeySpec, OPENAI_KEY},
    ChatMessage, CompletionConfig, CompletionResponse, GenerationRequest, LlmProvider,
    PromptInput, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a provider from an explicit key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::explicit(&OPENAI_KEY, api_key), DEFAULT_BASE_URL.to_string())
    }

    /// Create from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::with_credential(ApiCredential::from_env(&OPENAI_KEY)?, DEFAULT_BASE_URL.to_string()))
    }

    /// Create from provider options (`api_key`, `base_url`), falling back to
    /// the environment for the key.
    pub fn from_config(options: &JsonValue) -> Result<Self, ProviderError> {
        Ok(Self::with_credential(
            ApiCredential::resolve(&OPENAI_KEY, options)?,
            base_url(options, DEFAULT_BASE_URL)?,
        ))
    }

    fn with_credential(credential: ApiCredential, base_url: String) -> Self {
        Self {
            credential,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_request(request: &GenerationRequest, config: &CompletionConfig) -> ChatRequest {
        let messages = match &request.input {
            PromptInput::Text(text) => vec![ChatMessage::user(text.clone())],
            PromptInput::Messages(messages) => messages.clone(),
        };

        let last_user = messages.iter().rposition(|m| m.role == "user");
        let messages = messages
            .into_iter()
            .enumerate()
            .map(|(i, msg)| {
                let content = match (&request.attachment, Some(i) == last_user) {
                    (Some(attachment), true) => MessageContent::Parts(vec![
                        ContentPart::Text { text: msg.content },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: attachment.data_url(),
                            },
                        },
                    ]),
                    _ => MessageContent::Text(msg.content),
                };
                ApiMessage {
                    role: msg.role,
                    content,
                }
            })
            .collect();

        ChatRequest {
            model: config.model.clone(),
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            response_format: request.response_schema.as_ref().map(|schema| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": { "name": "response", "schema": schema, "strict": false }
                })
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        request: &GenerationRequest,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = Self::build_request(request, config);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let raw = response
                .text()
                .await
                .map_err(|e| ProviderError::HttpError(e.to_string()))?;
            let message = serde_json::from_str::<OpenAiError>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: body
                .usage
                .map(|u| TokenUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
            model: body.model,
            stop_reason: choice.finish_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Factory for creating OpenAI providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-...",      // Optional, falls back to OPENAI_API_KEY env
///   "base_url": "https://..." // Optional, custom API endpoint
/// }
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn key(&self) -> &'static KeySpec {
        &OPENAI_KEY
    }

    fn default_model(&self) -> &'static str {
        "gpt-4o"
    }

    fn create(&self, options: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OpenAiProvider::from_config(options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Attachment;

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-super-secret-key-12345";
        let provider = OpenAiProvider::new(secret_key);
        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
    }

    #[test]
    fn test_attachment_goes_on_last_user_message() {
        let request = GenerationRequest {
            input: PromptInput::Messages(vec![
                ChatMessage::system("verify"),
                ChatMessage::user("look at this"),
            ]),
            response_schema: Some(serde_json::json!({ "type": "object" })),
            attachment: Some(Attachment::new("image/jpeg", vec![0xff])),
        };
        let body = serde_json::to_value(OpenAiProvider::build_request(
            &request,
            &CompletionConfig::for_model("gpt-4o"),
        ))
        .unwrap();

        assert_eq!(body["messages"][0]["content"], "verify");
        assert_eq!(body["messages"][1]["content"][0]["type"], "text");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,/w=="
        );
        assert_eq!(body["response_format"]["type"], "json_schema");
    }

    #[test]
    fn test_text_input_is_single_user_message() {
        let request = GenerationRequest {
            input: PromptInput::Text("hello".into()),
            response_schema: None,
            attachment: None,
        };
        let body = serde_json::to_value(OpenAiProvider::build_request(
            &request,
            &CompletionConfig::default(),
        ))
        .unwrap();

        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_factory_defaults() {
        assert_eq!(OpenAiProviderFactory.default_model(), "gpt-4o");
        assert_eq!(OpenAiProviderFactory.key().env_var, "OPENAI_API_KEY");
        let provider = OpenAiProvider::from_config(&serde_json::json!({
            "api_key": "sk-test",
            "base_url": "https://proxy.internal/v1/"
        }))
        .unwrap();
        assert_eq!(provider.base_url, "https://proxy.internal/v1");
    }
}
