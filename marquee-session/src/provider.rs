//! Identity providers: where a page learns who the visitor is.

use std::time::Duration;

use async_trait::async_trait;
use marquee_core::{ConfigError, Session, SessionError, SessionInfo};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tracing::debug;

use crate::config::{ClientCredentials, SessionConfig};

/// Resolves the current visitor's session.
///
/// An unauthenticated visitor is a successful resolution
/// (`SessionStatus::Unauthenticated`), not an error. Errors are reserved for
/// "could not find out".
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self) -> Result<Session, SessionError>;
}

/// Asks the API's `GET /api/v1/session` endpoint.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    session_url: String,
    timeout: Duration,
}

impl HttpIdentityProvider {
    pub fn new(config: &SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.resolve_timeout)
            .default_headers(build_auth_headers(&config.credentials)?)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http_client".to_string(),
                value: config.api_base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            session_url: format!("{}/api/v1/session", config.api_base_url.trim_end_matches('/')),
            timeout: config.resolve_timeout,
        })
    }

    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    fn map_transport(&self, err: reqwest::Error) -> SessionError {
        if err.is_timeout() {
            SessionError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SessionError::ResolutionFailed {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self) -> Result<Session, SessionError> {
        let response = self
            .client
            .get(&self.session_url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        // 401: the API does not know this visitor. 403 never comes from this
        // endpoint since it requires no role.
        if status == StatusCode::UNAUTHORIZED {
            debug!("Identity provider reports no session");
            return Ok(Session::unauthenticated());
        }
        if !status.is_success() {
            return Err(SessionError::ResolutionFailed {
                reason: format!("session endpoint returned {}", status),
            });
        }

        let info: SessionInfo = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_transport(e)
            } else {
                SessionError::InvalidResponse {
                    reason: e.to_string(),
                }
            }
        })?;
        Ok(info.into_session())
    }
}

fn build_auth_headers(credentials: &ClientCredentials) -> Result<HeaderMap, ConfigError> {
    let invalid = |field: &str, reason: String| ConfigError::InvalidValue {
        field: field.to_string(),
        value: "<redacted>".to_string(),
        reason,
    };

    let mut headers = HeaderMap::new();
    if let Some(api_key) = &credentials.api_key {
        let mut value = HeaderValue::from_str(api_key).map_err(|e| invalid("api_key", e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-api-key"), value);
    }
    if let Some(jwt) = &credentials.jwt {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", jwt))
            .map_err(|e| invalid("jwt", e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }
    Ok(headers)
}
