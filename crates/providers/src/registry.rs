//! Provider registry.
//!
//! Constructs and holds the single configured LLM provider instance. At
//! startup the registry reads the [`LlmConfig`], resolves the provider's
//! credential, and instantiates the matching adapter. When
//! `require_provider` is `false` a failed adapter does not abort startup —
//! the failure is recorded and surfaced through [`ProviderRegistry::init_error`]
//! instead.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use eda_domain::config::{LlmConfig, ProviderKind};
use eda_domain::error::{Error, Result};
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds the instantiated LLM provider, if startup succeeded.
///
/// When `require_provider` is `false`, a failed adapter does not abort
/// startup — `provider()` returns `None` and the failure is recorded in
/// [`ProviderRegistry::init_error`] for readiness reporting.
pub struct ProviderRegistry {
    provider: Option<Arc<dyn LlmProvider>>,
    init_error: Option<ProviderInitError>,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    /// Error message with any potential secrets masked.
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message. This prevents raw secrets from leaking into logs or readiness
/// endpoints.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    /// Build the registry from the top-level [`LlmConfig`].
    ///
    /// If the provider adapter fails to construct and `require_provider` is
    /// `true`, the error propagates and startup should abort. If `false`,
    /// the failure is recorded and `provider()` returns `None` — callers
    /// (the agent loop) must then reject turns with a clear "no provider
    /// configured" error instead of panicking.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let pc = &config.provider;
        let built: Result<Arc<dyn LlmProvider>> = match pc.kind {
            ProviderKind::Anthropic => {
                AnthropicProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
            }
            ProviderKind::OpenaiCompat => {
                OpenAiCompatProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
            }
        };

        match built {
            Ok(provider) => Ok(Self {
                provider: Some(provider),
                init_error: None,
            }),
            Err(e) if config.require_provider => Err(e),
            Err(e) => {
                tracing::warn!(
                    provider = %pc.id,
                    error = %e,
                    "provider failed to initialize; continuing without an LLM provider"
                );
                Ok(Self {
                    provider: None,
                    init_error: Some(ProviderInitError {
                        provider_id: pc.id.clone(),
                        kind: format!("{:?}", pc.kind),
                        error: mask_secrets(&e.to_string()),
                    }),
                })
            }
        }
    }

    /// The configured provider, if it initialized successfully.
    pub fn provider(&self) -> Option<Arc<dyn LlmProvider>> {
        self.provider.clone()
    }

    /// The provider, or a [`Error::Provider`] describing why none is
    /// available — for call sites that need the provider unconditionally.
    pub fn require(&self) -> Result<Arc<dyn LlmProvider>> {
        self.provider.clone().ok_or_else(|| Error::Provider {
            provider: self
                .init_error
                .as_ref()
                .map(|e| e.provider_id.clone())
                .unwrap_or_else(|| "default".into()),
            message: self
                .init_error
                .as_ref()
                .map(|e| e.error.clone())
                .unwrap_or_else(|| "no LLM provider configured".into()),
        })
    }

    pub fn init_error(&self) -> Option<&ProviderInitError> {
        self.init_error.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.provider.is_some()
    }

    /// Build a registry around an already-constructed provider, bypassing
    /// config-driven adapter selection. Exists so integration tests can
    /// drive the agent loop against a scripted provider instead of a live
    /// API.
    #[cfg(feature = "testing")]
    pub fn from_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider: Some(provider),
            init_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_secrets_redacts_long_tokens() {
        let masked = mask_secrets("auth failed for key sk-ant-REDACTED");
        assert!(!masked.contains("verylongsecrettoken1234567890"));
    }

    #[test]
    fn allow_none_records_init_error_without_failing() {
        let mut config = LlmConfig::default();
        config.require_provider = false;
        config.provider.kind = ProviderKind::Anthropic;
        config.provider.auth.env = Some("EDA_TEST_MISSING_ANTHROPIC_KEY_XYZ".into());

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(!registry.is_ready());
        assert!(registry.init_error().is_some());
        assert!(registry.require().is_err());
    }

    #[test]
    fn require_provider_propagates_init_failure() {
        let mut config = LlmConfig::default();
        config.require_provider = true;
        config.provider.kind = ProviderKind::Anthropic;
        config.provider.auth.env = Some("EDA_TEST_MISSING_ANTHROPIC_KEY_ABC".into());

        assert!(ProviderRegistry::from_config(&config).is_err());
    }

    #[test]
    fn none_auth_mode_initializes_without_credential() {
        let mut config = LlmConfig::default();
        config.provider.kind = ProviderKind::OpenaiCompat;
        config.provider.auth.mode = eda_domain::config::AuthMode::None;

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.is_ready());
    }
}
