//! Configuration for page-level session guarding.
//!
//! Environment-driven with development defaults; `validate()` rejects values
//! that would make every page redirect or every resolution fail.

use std::time::Duration;

use marquee_core::ConfigError;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Credential the client presents when asking the API who it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCredentials {
    pub api_key: Option<String>,
    pub jwt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_base_url: String,
    /// Where a guarded page sends visitors who may not see it.
    pub login_path: String,
    /// Bound on one session resolution. Exceeding it counts as unauthenticated.
    pub resolve_timeout: Duration,
    pub credentials: ClientCredentials,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            resolve_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            credentials: ClientCredentials::default(),
        }
    }
}

impl SessionConfig {
    /// # Environment Variables
    /// - `MARQUEE_API_URL`
    /// - `MARQUEE_LOGIN_PATH` (default `/login`)
    /// - `MARQUEE_SESSION_TIMEOUT_MS` (default 5000)
    /// - `MARQUEE_API_KEY` / `MARQUEE_SESSION_TOKEN`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            api_base_url: non_empty("MARQUEE_API_URL").unwrap_or(defaults.api_base_url),
            login_path: non_empty("MARQUEE_LOGIN_PATH").unwrap_or(defaults.login_path),
            resolve_timeout: non_empty("MARQUEE_SESSION_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.resolve_timeout),
            credentials: ClientCredentials {
                api_key: non_empty("MARQUEE_API_KEY"),
                jwt: non_empty("MARQUEE_SESSION_TOKEN"),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_base_url".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url".to_string(),
                value: url.to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if !self.login_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "login_path".to_string(),
                value: self.login_path.clone(),
                reason: "must be an absolute path".to_string(),
            });
        }
        if self.resolve_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "resolve_timeout".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.login_path, "/login");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_relative_login_path() {
        let config = SessionConfig {
            login_path: "login".to_string(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "login_path"
        ));
    }

    #[test]
    fn test_rejects_non_http_url_and_zero_timeout() {
        let bad_url = SessionConfig {
            api_base_url: "ftp://example.com".to_string(),
            ..SessionConfig::default()
        };
        assert!(bad_url.validate().is_err());

        let zero = SessionConfig {
            resolve_timeout: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(zero.validate().is_err());
    }
}
