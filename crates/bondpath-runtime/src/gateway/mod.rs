//! Invocation gateway.
//!
//! The only path from the pipeline to an inference backend. One call goes to
//! the primary provider; throttling is retried on an exponential schedule
//! with jitter; once retries run out a configured secondary gets exactly one
//! attempt. Every other provider failure surfaces immediately.
//!
//! Responses are validated against the caller's [`ResponseSchema`] before
//! they are returned, so stages only ever see conforming mappings.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{GatewayConfig, ProviderSettings};
use crate::providers::{
    Attachment, ChatMessage, CompletionConfig, GenerationRequest, LlmProvider, PromptInput,
    ProviderError, ProviderRegistry,
};

mod retry;
pub mod schema;

pub use retry::RetryPolicy;
pub use schema::{Field, FieldType, ResponseSchema};

/// Failure category of an [`InferenceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceErrorKind {
    RateLimited,
    ProviderError,
    FallbackFailed,
    SchemaMismatch,
}

impl InferenceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceErrorKind::RateLimited => "rate_limited",
            InferenceErrorKind::ProviderError => "provider_error",
            InferenceErrorKind::FallbackFailed => "fallback_failed",
            InferenceErrorKind::SchemaMismatch => "schema_mismatch",
        }
    }
}

/// Errors from a gateway invocation.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Rate limited by {provider} after {attempts} attempts: {source}")]
    RateLimited {
        provider: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Provider {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("Fallback provider {provider} failed: {source}")]
    FallbackFailed {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("Response from {provider} does not match {schema}: {}", .violations.join("; "))]
    SchemaMismatch {
        provider: String,
        schema: String,
        violations: Vec<String>,
    },
}

impl InferenceError {
    pub fn kind(&self) -> InferenceErrorKind {
        match self {
            InferenceError::RateLimited { .. } => InferenceErrorKind::RateLimited,
            InferenceError::Provider { .. } => InferenceErrorKind::ProviderError,
            InferenceError::FallbackFailed { .. } => InferenceErrorKind::FallbackFailed,
            InferenceError::SchemaMismatch { .. } => InferenceErrorKind::SchemaMismatch,
        }
    }
}

/// A prompt plus the context and attachment that travel with it.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    pub prompt: String,
    pub context: Option<JsonValue>,
    pub attachment: Option<Attachment>,
}

impl InvocationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: JsonValue) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Prompt and serialized context as one request body.
    pub fn merged_prompt(&self) -> String {
        let context = self
            .context
            .as_ref()
            .map(JsonValue::to_string)
            .unwrap_or_else(|| "{}".to_string());
        format!("{}\n\nContext: {}", self.prompt, context)
    }
}

/// A provider and the completion settings used with it.
#[derive(Clone)]
struct Endpoint {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl Endpoint {
    fn name(&self) -> String {
        self.provider.name().to_string()
    }
}

/// Primary/secondary provider pair with retry and fallback.
#[derive(Clone)]
pub struct Gateway {
    primary: Endpoint,
    secondary: Option<Endpoint>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("primary", &self.primary.provider.name())
            .field("secondary", &self.secondary.as_ref().map(|s| s.provider.name()))
            .field("retry", &self.retry)
            .finish()
    }
}

impl Gateway {
    pub fn new(primary: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            primary: Endpoint {
                provider: primary,
                config,
            },
            secondary: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Configure the fallback provider.
    pub fn with_secondary(mut self, provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        self.secondary = Some(Endpoint { provider, config });
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Assemble a gateway from configuration using registered factories.
    pub fn from_config(
        config: &GatewayConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, ProviderError> {
        let build = |settings: &ProviderSettings| -> Result<Endpoint, ProviderError> {
            let (provider, config) = registry.build(settings)?;
            Ok(Endpoint { provider, config })
        };

        Ok(Self {
            primary: build(&config.primary)?,
            secondary: config.secondary.as_ref().map(build).transpose()?,
            retry: config.retry.clone(),
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Invoke with a prompt and optional context.
    pub async fn invoke(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
        context: Option<&JsonValue>,
    ) -> Result<JsonValue, InferenceError> {
        let request = InvocationRequest {
            prompt: prompt.to_string(),
            context: context.cloned(),
            attachment: None,
        };
        self.invoke_request(&request, schema).await
    }

    /// Invoke with a full request, including any attachment.
    pub async fn invoke_request(
        &self,
        request: &InvocationRequest,
        schema: &ResponseSchema,
    ) -> Result<JsonValue, InferenceError> {
        let merged = request.merged_prompt();
        let response_schema = Some(schema.to_json_schema());

        let primary_request = GenerationRequest {
            input: PromptInput::Text(merged.clone()),
            response_schema: response_schema.clone(),
            attachment: request.attachment.clone(),
        };

        let mut schedule = self.retry.schedule();
        let mut attempts = 0u32;
        let exhausted = loop {
            attempts += 1;
            match self
                .primary
                .provider
                .complete(&primary_request, &self.primary.config)
                .await
            {
                Ok(response) => {
                    tracing::debug!(
                        provider = %self.primary.provider.name(),
                        attempt = attempts,
                        tokens = response.usage.total(),
                        "Primary call succeeded"
                    );
                    return decode(&self.primary, schema, &response.content);
                }
                Err(e) if e.is_rate_limited() => match schedule.next() {
                    Some(delay) => {
                        let wait = delay + self.retry.jitter();
                        tracing::warn!(
                            provider = %self.primary.provider.name(),
                            attempt = attempts,
                            delay_ms = wait.as_millis() as u64,
                            error = %e,
                            "Primary rate limited, backing off"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    None => break e,
                },
                Err(e) => {
                    return Err(InferenceError::Provider {
                        provider: self.primary.name(),
                        source: e,
                    });
                }
            }
        };

        let Some(secondary) = &self.secondary else {
            return Err(InferenceError::RateLimited {
                provider: self.primary.name(),
                attempts,
                source: exhausted,
            });
        };

        tracing::warn!(
            primary = %self.primary.provider.name(),
            secondary = %secondary.provider.name(),
            attempts,
            "Primary retries exhausted, falling back"
        );

        let fallback_request = GenerationRequest {
            input: PromptInput::Messages(vec![ChatMessage::user(merged)]),
            response_schema,
            attachment: request.attachment.clone(),
        };

        let response = secondary
            .provider
            .complete(&fallback_request, &secondary.config)
            .await
            .map_err(|source| InferenceError::FallbackFailed {
                provider: secondary.name(),
                source,
            })?;

        decode(secondary, schema, &response.content)
    }
}

fn decode(
    endpoint: &Endpoint,
    schema: &ResponseSchema,
    content: &str,
) -> Result<JsonValue, InferenceError> {
    schema
        .decode(content)
        .map_err(|violations| InferenceError::SchemaMismatch {
            provider: endpoint.name(),
            schema: schema.name().to_string(),
            violations,
        })
}
