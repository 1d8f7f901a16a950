//! Shared helpers for provider adapters.

use ac_domain::config::{AuthConfig, AuthMode};
use ac_domain::{Error, Result};

/// Converts a [`reqwest::Error`] into the shared domain error type.
/// Timeouts classify as `Transient`; everything else as `Http`.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolves the `(header_name, header_value)` pair to attach to outbound
/// requests for this provider, or `None` under `AuthMode::None`.
pub(crate) fn resolve_auth_header(auth: &AuthConfig) -> Result<Option<(String, String)>> {
    if auth.mode == AuthMode::None {
        return Ok(None);
    }
    let env_var = auth
        .env
        .as_deref()
        .ok_or_else(|| Error::Config("auth.mode=api_key requires auth.env to be set".into()))?;
    let key = std::env::var(env_var).map_err(|_| {
        Error::Config(format!(
            "environment variable '{env_var}' not set or not valid UTF-8"
        ))
    })?;
    let header = auth.header.clone().unwrap_or_else(|| "Authorization".into());
    let prefix = auth.prefix.clone().unwrap_or_else(|| "Bearer ".into());
    Ok(Some((header, format!("{prefix}{key}"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mode_none_skips_header() {
        let auth = AuthConfig {
            mode: AuthMode::None,
            ..Default::default()
        };
        assert!(resolve_auth_header(&auth).unwrap().is_none());
    }

    #[test]
    fn missing_env_var_is_a_config_error() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some("AC_TEST_PROVIDERS_MISSING_VAR_999".into()),
            ..Default::default()
        };
        assert!(resolve_auth_header(&auth).is_err());
    }

    #[test]
    fn resolves_header_with_default_bearer_prefix() {
        std::env::set_var("AC_TEST_PROVIDERS_KEY_1", "secret-value");
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some("AC_TEST_PROVIDERS_KEY_1".into()),
            ..Default::default()
        };
        let (header, value) = resolve_auth_header(&auth).unwrap().unwrap();
        assert_eq!(header, "Authorization");
        assert_eq!(value, "Bearer secret-value");
        std::env::remove_var("AC_TEST_PROVIDERS_KEY_1");
    }

    #[test]
    fn custom_header_and_prefix_are_honored() {
        std::env::set_var("AC_TEST_PROVIDERS_KEY_2", "abc");
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            header: Some("x-api-key".into()),
            prefix: Some(String::new()),
            env: Some("AC_TEST_PROVIDERS_KEY_2".into()),
        };
        let (header, value) = resolve_auth_header(&auth).unwrap().unwrap();
        assert_eq!(header, "x-api-key");
        assert_eq!(value, "abc");
        std::env::remove_var("AC_TEST_PROVIDERS_KEY_2");
    }
}
