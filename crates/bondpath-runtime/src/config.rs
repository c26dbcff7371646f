//! Runtime configuration.
//!
//! Loaded from YAML with human-readable durations. A few retry knobs can be
//! overridden from the environment so operators can tune throttling without
//! shipping a new file.
//!
//! ```yaml
//! policy:
//!   max_bond_amount: 250000
//!   allowed_jurisdictions: [TX, OK]
//! gateway:
//!   primary:
//!     provider: gemini
//!     model: gemini-2.0-flash
//!     timeout: 30s
//!   secondary:
//!     provider: openai
//!     model: gpt-4o
//!   retry:
//!     max_retries: 2
//!     base_delay: 1s
//!     max_jitter: 2s
//! ```

use anyhow::{bail, Context};
use bondpath_core::PolicyConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;

use crate::gateway::RetryPolicy;
use crate::providers::CompletionConfig;

/// Overrides `retry.max_retries`.
pub const ENV_MAX_RETRIES: &str = "BONDPATH_MAX_RETRIES";
/// Overrides `retry.base_delay` (humantime, e.g. `750ms`).
pub const ENV_RETRY_BASE_DELAY: &str = "BONDPATH_RETRY_BASE_DELAY";
/// Overrides `retry.max_jitter` (humantime).
pub const ENV_RETRY_MAX_JITTER: &str = "BONDPATH_RETRY_MAX_JITTER";

/// Serde adapter for `Duration` as a humantime string (`"1s"`, `"250ms"`).
pub mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

/// One provider endpoint: which factory builds it and how it is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registered provider type, e.g. `gemini`
    pub provider: String,

    #[serde(flatten)]
    pub completion: CompletionConfig,

    /// Passed to the provider factory (`api_key`, `base_url`)
    #[serde(default = "empty_object")]
    pub options: JsonValue,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl ProviderSettings {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            completion: CompletionConfig::for_model(model),
            options: empty_object(),
        }
    }
}

/// Provider pair and retry policy for the invocation gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub primary: ProviderSettings,

    #[serde(default)]
    pub secondary: Option<ProviderSettings>,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            primary: ProviderSettings::new("gemini", "gemini-2.0-flash"),
            secondary: Some(ProviderSettings::new("openai", "gpt-4o")),
            retry: RetryPolicy::default(),
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl RuntimeConfig {
    /// Parse YAML, apply environment overrides and validate.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let mut config: RuntimeConfig =
            serde_yaml::from_str(yaml).context("Invalid runtime configuration YAML")?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Apply `BONDPATH_*` retry overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            self.gateway.retry.max_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a non-negative integer", ENV_MAX_RETRIES))?;
        }
        if let Some(raw) = lookup(ENV_RETRY_BASE_DELAY) {
            self.gateway.retry.base_delay = parse_duration(ENV_RETRY_BASE_DELAY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRY_MAX_JITTER) {
            self.gateway.retry.max_jitter = parse_duration(ENV_RETRY_MAX_JITTER, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.policy.validate().context("Invalid policy")?;
        if self.gateway.primary.provider.trim().is_empty() {
            bail!("gateway.primary.provider must be set");
        }
        if self.gateway.retry.base_delay.is_zero() {
            bail!("gateway.retry.base_delay must be greater than zero");
        }
        Ok(())
    }
}

fn parse_duration(key: &str, raw: &str) -> anyhow::Result<Duration> {
    humantime::parse_duration(raw.trim())
        .with_context(|| format!("{} must be a duration like '1s' or '500ms'", key))
}
