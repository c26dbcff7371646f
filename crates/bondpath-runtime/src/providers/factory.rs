//! Provider factories for assembling the gateway from configuration.
//!
//! Deployment config names providers by type (`"gemini"`, `"openai"`); the
//! registry maps those names to factories that build configured instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::secrets::KeySpec;
use super::{CompletionConfig, LlmProvider, ProviderError};
use crate::config::ProviderSettings;

/// Builds one kind of provider from its `options` block.
pub trait ProviderFactory: Send + Sync {
    /// Type name used in configuration, e.g. `"gemini"`.
    fn provider_type(&self) -> &'static str;

    fn key(&self) -> &'static KeySpec;

    /// Model used when the settings leave it blank.
    fn default_model(&self) -> &'static str;

    fn create(&self, options: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Check options without building anything.
    fn validate_config(&self, options: &JsonValue) -> Result<(), ProviderError> {
        if !self.key().is_configured(options) {
            return Err(self.key().missing());
        }
        base_url(options, "").map(|_| ())
    }
}

/// The `base_url` option without trailing slashes, or `default` when unset.
pub(crate) fn base_url(options: &JsonValue, default: &str) -> Result<String, ProviderError> {
    match options.get("base_url").and_then(JsonValue::as_str) {
        None => Ok(default.to_string()),
        Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
            Ok(url.trim_end_matches('/').to_string())
        }
        Some(url) => Err(ProviderError::NotConfigured(format!(
            "base_url '{}' must start with http:// or https://",
            url
        ))),
    }
}

/// Provider factories by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every provider compiled into this build.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "gemini")]
        registry.register(Arc::new(super::GeminiProviderFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry
    }

    /// Add a factory. A later factory for the same type replaces the earlier.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        let provider_type = factory.provider_type();
        if self.factories.insert(provider_type, factory).is_some() {
            tracing::warn!(provider_type, "Replacing provider factory");
        }
    }

    pub fn contains(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    pub fn provider_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Check one endpoint's settings.
    pub fn validate(&self, settings: &ProviderSettings) -> Result<(), ProviderError> {
        self.factory(&settings.provider)?
            .validate_config(&settings.options)
    }

    /// Build the provider for one endpoint plus the completion config it is
    /// called with. A blank model takes the factory's default.
    pub fn build(
        &self,
        settings: &ProviderSettings,
    ) -> Result<(Arc<dyn LlmProvider>, CompletionConfig), ProviderError> {
        let factory = self.factory(&settings.provider)?;
        factory.validate_config(&settings.options)?;

        let mut completion = settings.completion.clone();
        if completion.model.trim().is_empty() {
            completion.model = factory.default_model().to_string();
        }

        tracing::debug!(
            provider = %settings.provider,
            model = %completion.model,
            "Building provider"
        );
        Ok((factory.create(&settings.options)?, completion))
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.provider_types()
            ))
        })
    }
}
