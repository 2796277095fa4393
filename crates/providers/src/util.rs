//! Shared utility functions for provider adapters.

use eda_domain::config::{AuthConfig, AuthMode};
use eda_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the credential for an [`AuthConfig`].
///
/// Returns `Ok(None)` when `mode` is [`AuthMode::None`] — some providers
/// (local model servers, test doubles) take no credential at all. Otherwise
/// reads the environment variable named in `env`.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<Option<String>> {
    if auth.mode == AuthMode::None {
        return Ok(None);
    }

    let env_var = auth.env.as_deref().ok_or_else(|| {
        Error::Auth("AuthConfig.mode is api_key but no 'env' variable name is set".into())
    })?;

    std::env::var(env_var)
        .map(Some)
        .map_err(|_| Error::Auth(format!("environment variable '{env_var}' not set or not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_none_mode_skips_env() {
        let auth = AuthConfig {
            mode: AuthMode::None,
            env: Some("EDA_TEST_SHOULD_NOT_BE_READ".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), None);
    }

    #[test]
    fn resolve_api_key_reads_env_var() {
        let var_name = "EDA_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some(var_name.into()),
            ..Default::default()
        };
        let result = resolve_api_key(&auth).unwrap();
        assert_eq!(result.as_deref(), Some("env-secret-value"));
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_env_var_errors() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some("EDA_TEST_NONEXISTENT_VAR_8888".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("EDA_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_api_key_no_env_name_configured_errors() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("no 'env' variable"));
    }
}
