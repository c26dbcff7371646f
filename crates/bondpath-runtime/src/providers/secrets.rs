//! API keys for inference providers.
//!
//! Case facts flow through the same logs as provider calls, so keys are
//! wrapped in [`ApiCredential`] as soon as they are read and only exposed
//! when a request header is built.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Option key holding an inline API key in provider settings.
pub const API_KEY_OPTION: &str = "api_key";

/// Where one provider's key is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub label: &'static str,
    pub env_var: &'static str,
}

pub const GEMINI_KEY: KeySpec = KeySpec {
    label: "Gemini API key",
    env_var: "GEMINI_API_KEY",
};

pub const OPENAI_KEY: KeySpec = KeySpec {
    label: "OpenAI API key",
    env_var: "OPENAI_API_KEY",
};

impl KeySpec {
    fn inline<'a>(&self, options: &'a JsonValue) -> Option<&'a str> {
        options
            .get(API_KEY_OPTION)
            .and_then(JsonValue::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    fn env_value(&self) -> Option<String> {
        std::env::var(self.env_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Whether [`ApiCredential::resolve`] would find a key.
    pub fn is_configured(&self, options: &JsonValue) -> bool {
        self.inline(options).is_some() || self.env_value().is_some()
    }

    pub(crate) fn missing(&self) -> ProviderError {
        ProviderError::NotConfigured(format!(
            "{} required: set '{}' in provider options or {}",
            self.label, API_KEY_OPTION, self.env_var
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Options,
    Environment,
    Explicit,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Options => "options",
            CredentialSource::Environment => "environment",
            CredentialSource::Explicit => "explicit",
        }
    }
}

/// A provider key that never prints.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    label: &'static str,
}

impl ApiCredential {
    pub fn explicit(spec: &KeySpec, value: impl Into<String>) -> Self {
        Self::wrap(spec, value.into(), CredentialSource::Explicit)
    }

    /// Key from the environment variable only.
    pub fn from_env(spec: &KeySpec) -> Result<Self, ProviderError> {
        spec.env_value()
            .map(|v| Self::wrap(spec, v, CredentialSource::Environment))
            .ok_or_else(|| spec.missing())
    }

    /// Inline `api_key` option first, then the environment. Blank values
    /// count as missing.
    pub fn resolve(spec: &KeySpec, options: &JsonValue) -> Result<Self, ProviderError> {
        if let Some(key) = spec.inline(options) {
            return Ok(Self::wrap(spec, key.to_string(), CredentialSource::Options));
        }
        Self::from_env(spec)
    }

    fn wrap(spec: &KeySpec, value: String, source: CredentialSource) -> Self {
        Self {
            value: SecretString::from(value),
            source,
            label: spec.label,
        }
    }

    /// Only call when building a request.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [REDACTED]", self.label, self.source.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_KEY: KeySpec = KeySpec {
        label: "Test key",
        env_var: "BONDPATH_TEST_PROVIDER_KEY",
    };

    const UNSET_KEY: KeySpec = KeySpec {
        label: "Unset key",
        env_var: "BONDPATH_UNSET_PROVIDER_KEY_12345",
    };

    #[test]
    fn test_debug_is_redacted() {
        let secret = "gm-super-secret-key-12345";
        let cred = ApiCredential::explicit(&GEMINI_KEY, secret);

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret));
        assert_eq!(debug, "Gemini API key (explicit) [REDACTED]");
        assert_eq!(cred.expose(), secret);
    }

    #[test]
    fn test_options_win_over_environment() {
        std::env::set_var(TEST_KEY.env_var, "env-key");

        let inline = ApiCredential::resolve(&TEST_KEY, &json!({ "api_key": "inline-key" })).unwrap();
        assert_eq!(inline.expose(), "inline-key");
        assert_eq!(inline.source(), CredentialSource::Options);

        // blank inline keys fall through
        let blank = ApiCredential::resolve(&TEST_KEY, &json!({ "api_key": "  " })).unwrap();
        assert_eq!(blank.expose(), "env-key");
        assert_eq!(blank.source(), CredentialSource::Environment);

        std::env::remove_var(TEST_KEY.env_var);
    }

    #[test]
    fn test_missing_key_names_both_places() {
        let err = ApiCredential::resolve(&UNSET_KEY, &json!({})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Unset key"));
        assert!(message.contains(API_KEY_OPTION));
        assert!(message.contains(UNSET_KEY.env_var));
        assert!(!UNSET_KEY.is_configured(&json!({})));
        assert!(UNSET_KEY.is_configured(&json!({ "api_key": "k" })));
    }
}
