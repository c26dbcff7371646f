//! Inference provider abstractions for bondpath-runtime.
//!
//! This module defines the trait for inference providers and includes
//! HTTP implementations for Gemini (primary) and OpenAI (secondary).
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for secure credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod fetch;
pub mod secrets;

#[cfg(feature = "gemini")]
mod gemini;
#[cfg(feature = "openai")]
mod openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use fetch::{BinaryFetch, BinaryFetcher, FetchError, FetchedBinary};
pub use secrets::{ApiCredential, CredentialSource, KeySpec, GEMINI_KEY, OPENAI_KEY};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiProvider, GeminiProviderFactory};
#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory};

lazy_static::lazy_static! {
    /// Failure text that marks a quota or throttling response.
    static ref RATE_LIMIT_SIGNATURE: regex::Regex =
        regex::Regex::new(r"(?i)\b429\b|quota|rate[ _-]?limit|resource[ _]exhausted")
            .expect("rate limit pattern is valid");
}

/// Errors from inference providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether this failure carries a rate-limit or quota signature.
    ///
    /// Providers do not always surface throttling as HTTP 429; some wrap it
    /// in a generic API error whose message mentions the quota.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status: 429, .. } => true,
            ProviderError::ApiError { message, .. } | ProviderError::HttpError(message) => {
                RATE_LIMIT_SIGNATURE.is_match(message)
            }
            _ => false,
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Model to use. Blank takes the provider factory's default.
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Request timeout
    #[serde(with = "crate::config::humantime_duration")]
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 2048,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CompletionConfig {
    /// Create a config for a model with default limits.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Binary payload sent alongside a prompt (scanned IDs, booking sheets).
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Media type, e.g. `image/png`
    pub media_type: String,

    /// Raw bytes
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("media_type", &self.media_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Attachment {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// Base64 body without any prefix.
    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// `data:` URL form used by chat-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64())
    }
}

/// A chat message for message-style calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// What the model is asked: a bare prompt or a message list.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    Text(String),
    Messages(Vec<ChatMessage>),
}

impl PromptInput {
    /// Flatten to plain text, one message per paragraph.
    pub fn as_text(&self) -> String {
        match self {
            PromptInput::Text(text) => text.clone(),
            PromptInput::Messages(messages) => messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// One call to a provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Prompt or messages
    pub input: PromptInput,

    /// JSON Schema the response must follow, when structured output is wanted
    pub response_schema: Option<JsonValue>,

    /// Optional binary attachment for multimodal calls
    pub attachment: Option<Attachment>,
}

/// Response from a provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content (JSON text for structured calls)
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping inference backends.
///
/// The invocation gateway is the only caller; stages never talk to a
/// provider directly.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a generation call.
    async fn complete(
        &self,
        request: &GenerationRequest,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is healthy.
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;
}
