//! Google Gemini provider implementation.
//!
//! Uses `generateContent` with JSON response mode. When the request carries
//! a response schema it is forwarded as `responseSchema`, and attachments are
//! sent as `inline_data` parts.

use super::{
    factory::{base_url, ProviderFactory},
    secrets::{ApiCredential, KeySpec, GEMINI_KEY},
    CompletionConfig, CompletionResponse, GenerationRequest, LlmProvider, PromptInput,
    ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider from an explicit key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::explicit(&GEMINI_KEY, api_key), DEFAULT_BASE_URL.to_string())
    }

    /// Create from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::with_credential(ApiCredential::from_env(&GEMINI_KEY)?, DEFAULT_BASE_URL.to_string()))
    }

    /// Create from provider options (`api_key`, `base_url`), falling back to
    /// the environment for the key.
    pub fn from_config(options: &JsonValue) -> Result<Self, ProviderError> {
        Ok(Self::with_credential(
            ApiCredential::resolve(&GEMINI_KEY, options)?,
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

    fn build_request(request: &GenerationRequest, config: &CompletionConfig) -> GeminiRequest {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        match &request.input {
            PromptInput::Text(text) => contents.push(GeminiContent {
                role: "user".to_string(),
                parts: vec![Part::Text { text: text.clone() }],
            }),
            PromptInput::Messages(messages) => {
                for msg in messages {
                    if msg.role == "system" {
                        system_instruction = Some(GeminiContent {
                            role: "user".to_string(),
                            parts: vec![Part::Text {
                                text: msg.content.clone(),
                            }],
                        });
                        continue;
                    }
                    let role = if msg.role == "assistant" { "model" } else { "user" };
                    contents.push(GeminiContent {
                        role: role.to_string(),
                        parts: vec![Part::Text {
                            text: msg.content.clone(),
                        }],
                    });
                }
            }
        }

        if let Some(attachment) = &request.attachment {
            if let Some(last) = contents.last_mut() {
                last.parts.push(Part::InlineData {
                    inline_data: InlineData {
                        mime_type: attachment.media_type.clone(),
                        data: attachment.base64(),
                    },
                });
            }
        }

        let response_schema = request.response_schema.as_ref().map(openapi_subset);
        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
                response_mime_type: response_schema
                    .as_ref()
                    .map(|_| "application/json".to_string()),
                response_schema,
            },
        }
    }
}

/// Gemini accepts an OpenAPI subset of JSON Schema: no
/// `additionalProperties` and no `title`, and nullability is a flag rather than
/// a type union.
fn openapi_subset(schema: &JsonValue) -> JsonValue {
    match schema {
        JsonValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "additionalProperties" | "title" => {}
                    "properties" => {
                        let props = value
                            .as_object()
                            .map(|p| {
                                p.iter()
                                    .map(|(name, s)| (name.clone(), openapi_subset(s)))
                                    .collect()
                            })
                            .unwrap_or_default();
                        out.insert(key.clone(), JsonValue::Object(props));
                    }
                    "type" => match value.as_array() {
                        Some(types) => {
                            let mut nullable = false;
                            for ty in types {
                                if ty == "null" {
                                    nullable = true;
                                } else {
                                    out.insert("type".to_string(), ty.clone());
                                }
                            }
                            if nullable {
                                out.insert("nullable".to_string(), JsonValue::Bool(true));
                            }
                        }
                        None => {
                            out.insert(key.clone(), value.clone());
                        }
                    },
                    _ => {
                        out.insert(key.clone(), openapi_subset(value));
                    }
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(openapi_subset).collect()),
        other => other.clone(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        request: &GenerationRequest,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = Self::build_request(request, config);

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, config.model
            ))
            .header("x-goog-api-key", self.credential.expose())
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

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let raw = response
                .text()
                .await
                .map_err(|e| ProviderError::HttpError(e.to_string()))?;
            let message = match serde_json::from_str::<GeminiError>(&raw) {
                Ok(GeminiError { error }) => match error.status {
                    Some(s) => format!("{}: {}", s, error.message),
                    None => error.message,
                },
                Err(_) => raw,
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no candidates".to_string()))?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = body
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: body.model_version.unwrap_or_else(|| config.model.clone()),
            stop_reason: candidate.finish_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Factory for creating Gemini providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "...",         // Optional, falls back to GEMINI_API_KEY env
///   "base_url": "https://..." // Optional, custom API endpoint
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn key(&self) -> &'static KeySpec {
        &GEMINI_KEY
    }

    fn default_model(&self) -> &'static str {
        "gemini-2.0-flash"
    }

    fn create(&self, options: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_config(options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Attachment, ChatMessage};

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "gm-super-secret-key-12345";
        let provider = GeminiProvider::new(secret_key);
        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_request_shape_with_schema_and_attachment() {
        let request = GenerationRequest {
            input: PromptInput::Text("extract".into()),
            response_schema: Some(serde_json::json!({
                "type": "object",
                "title": "Doc",
                "properties": { "name": { "type": ["string", "null"] } },
                "additionalProperties": true
            })),
            attachment: Some(Attachment::new("image/png", vec![1, 2, 3])),
        };
        let body = serde_json::to_value(GeminiProvider::build_request(
            &request,
            &CompletionConfig::default(),
        ))
        .unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "extract");
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        let schema = &body["generationConfig"]["responseSchema"];
        assert!(schema.get("additionalProperties").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["properties"]["name"]["type"], "string");
        assert_eq!(schema["properties"]["name"]["nullable"], true);
    }

    #[test]
    fn test_system_message_becomes_instruction() {
        let request = GenerationRequest {
            input: PromptInput::Messages(vec![
                ChatMessage::system("be terse"),
                ChatMessage::user("hi"),
            ]),
            response_schema: None,
            attachment: None,
        };
        let body = serde_json::to_value(GeminiProvider::build_request(
            &request,
            &CompletionConfig::default(),
        ))
        .unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let config = serde_json::json!({ "api_key": "k", "base_url": "ftp://x" });
        assert!(GeminiProviderFactory.validate_config(&config).is_err());
    }

    #[test]
    fn test_from_config_tracks_source() {
        let config = serde_json::json!({ "api_key": "config-key" });
        let provider = GeminiProvider::from_config(&config).unwrap();
        assert_eq!(provider.credential.source(), crate::providers::CredentialSource::Options);
        assert_eq!(provider.name(), "gemini");
    }
}
