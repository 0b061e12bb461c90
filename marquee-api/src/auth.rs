//! Authentication Module
//!
//! Resolves the caller's identity for the Marquee API. Two credential forms
//! are accepted:
//! 1. API key (via X-API-Key header), mapped to a role in configuration
//! 2. JWT token (via Authorization: Bearer header), role taken from the `role` claim
//!
//! Authentication only establishes who the caller is and which role string
//! they carry. Whether that role is sufficient is decided by
//! [`marquee_core::PermissionGate`].

use crate::error::{ApiError, ApiResult};
use chrono::TimeZone;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use marquee_core::{ConfigError, MarqueeError, Session, SessionInfo, SessionStatus, Timestamp};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for JWT time validation.
///
/// Time checks are done here rather than inside `jsonwebtoken` so tests can
/// pin the clock and a pre-epoch system clock surfaces as an error.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. May be negative on a broken host.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// Test clock helpers for common scenarios.
#[cfg(test)]
pub mod test_clocks {
    use super::FixedClock;

    /// 2024-01-01 00:00:00 UTC
    pub fn valid() -> FixedClock {
        FixedClock(1704067200)
    }

    /// 2030-01-01 00:00:00 UTC
    pub fn future() -> FixedClock {
        FixedClock(1893456000)
    }
}

// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// JWT signing secret that never appears in logs or debug output.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Create a new JWT secret. Empty secrets are rejected.
    pub fn new(secret: String) -> Result<Self, MarqueeError> {
        if secret.is_empty() {
            return Err(MarqueeError::Config(ConfigError::MissingRequired {
                field: "jwt_secret".to_string(),
            }));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value for signing and verification.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// API keys and the role each one carries. `None` means the key
    /// authenticates but holds no role.
    pub api_keys: HashMap<String, Option<String>>,

    /// JWT secret key for signing and verification
    pub jwt_secret: JwtSecret,

    /// JWT algorithm (default: HS256)
    pub jwt_algorithm: Algorithm,

    /// JWT token expiration in seconds (default: 1 hour)
    pub jwt_expiration_secs: i64,

    /// JWT clock skew tolerance in seconds (default: 60)
    pub jwt_clock_skew_secs: i64,

    /// Clock for JWT time validation
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format!("[{} keys]", self.api_keys.len()))
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let secret_str = std::env::var("MARQUEE_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            api_keys: HashMap::new(),
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `MARQUEE_API_KEYS`: Comma-separated `key=role` pairs (a bare `key` has no role)
    /// - `MARQUEE_JWT_SECRET`: JWT signing secret
    /// - `MARQUEE_JWT_EXPIRATION_SECS`: JWT token expiration (default: 3600)
    /// - `MARQUEE_JWT_CLOCK_SKEW_SECS`: JWT clock skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let api_keys = std::env::var("MARQUEE_API_KEYS")
            .map(|s| parse_api_keys(&s))
            .unwrap_or_default();

        let secret_str = std::env::var("MARQUEE_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            api_keys,
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: std::env::var("MARQUEE_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            jwt_clock_skew_secs: std::env::var("MARQUEE_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            clock: Arc::new(SystemClock),
        }
    }

    /// Refuse insecure JWT secrets when `MARQUEE_ENVIRONMENT=production`.
    /// Outside production the same problems are logged as warnings.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let environment = std::env::var("MARQUEE_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();

        let is_production = environment == "production" || environment == "prod";

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "Cannot start server in production with insecure JWT secret. \
                     Set MARQUEE_JWT_SECRET to a secure value. \
                     MARQUEE_ENVIRONMENT={}",
                    environment
                )));
            }
            tracing::warn!(
                "Using insecure default JWT secret. Set MARQUEE_JWT_SECRET to a secure \
                 random value (minimum 32 characters) before deploying."
            );
        }

        if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            } else if !self.jwt_secret.is_insecure_default() {
                tracing::warn!(
                    chars = self.jwt_secret.len(),
                    "JWT secret is short; use at least 32 characters in production"
                );
            }
        }

        Ok(())
    }

    /// Register an API key carrying `role`.
    pub fn add_api_key(&mut self, key: impl Into<String>, role: Option<&str>) {
        self.api_keys.insert(key.into(), role.map(str::to_string));
    }

    /// Role carried by a key, or `None` if the key is unknown.
    pub fn api_key_role(&self, key: &str) -> Option<Option<&str>> {
        self.api_keys.get(key).map(|role| role.as_deref())
    }
}

/// Parse `key=role,key2,key3=admin`.
fn parse_api_keys(raw: &str) -> HashMap<String, Option<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((key, role)) => {
                let key = key.trim();
                let role = role.trim();
                (!key.is_empty())
                    .then(|| (key.to_string(), (!role.is_empty()).then(|| role.to_string())))
            }
            None => Some((entry.to_string(), None)),
        })
        .collect()
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    let normalized = if secret_str.trim().is_empty() {
        INSECURE_DEFAULT_SECRET.to_string()
    } else {
        secret_str
    };

    match JwtSecret::new(normalized) {
        Ok(secret) => secret,
        Err(_) => JwtSecret(SecretString::new(INSECURE_DEFAULT_SECRET.to_string().into())),
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Single role string. Kept verbatim, recognized or not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    pub fn new(subject: String, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();

        Self {
            sub: subject,
            iat: now,
            exp: now + expiration_secs,
            nbf: None,
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_not_before(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Authenticated principal, inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Principal id (JWT `sub` or a non-reversible API key label)
    pub subject: String,

    /// Role string as presented, possibly unrecognized
    pub role: Option<String>,

    /// Authentication method used
    pub auth_method: AuthMethod,

    /// Credential expiry, if the credential has one
    pub expires_at: Option<Timestamp>,
}

impl AuthContext {
    pub fn new(subject: impl Into<String>, role: Option<String>, auth_method: AuthMethod) -> Self {
        Self {
            subject: subject.into(),
            role,
            auth_method,
            expires_at: None,
        }
    }

    /// Raw role string for [`marquee_core::PermissionGate::authorize`].
    pub fn principal_role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Wire form consumed by client session guards.
    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            subject: Some(self.subject.clone()),
            role: self.role.clone(),
            status: SessionStatus::Authenticated,
            expires_at: self.expires_at,
        }
    }

    /// Typed session. An unrecognized role becomes absent.
    pub fn session(&self) -> Session {
        self.session_info().into_session()
    }
}

/// Authentication method used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Jwt,
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

/// Check JWT times against our own clock with a skew allowance.
fn validate_claim_times(now: i64, exp: i64, nbf: Option<i64>, leeway_secs: i64) -> ApiResult<()> {
    if let Some(nbf) = nbf {
        if now + leeway_secs < nbf {
            return Err(ApiError::unauthorized("Token not yet valid (nbf)"));
        }
    }

    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }

    Ok(())
}

/// Validate a JWT token and extract claims.
///
/// `jsonwebtoken` checks the signature only; expiry is checked against
/// `config.clock`.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();

    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error(
            "Server time configuration error - please contact support",
        ));
    }

    validate_claim_times(now, claims.exp, claims.nbf, config.jwt_clock_skew_secs)?;

    Ok(claims)
}

/// Generate a signed JWT for `subject` carrying `role`.
pub fn generate_jwt_token(
    config: &AuthConfig,
    subject: impl Into<String>,
    role: Option<&str>,
) -> ApiResult<String> {
    let mut claims = Claims::new(subject.into(), config.jwt_expiration_secs, &*config.clock);
    if let Some(role) = role {
        claims = claims.with_role(role);
    }

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Stable principal id for an API key: a SHA-256 prefix, never key material.
pub fn api_key_subject(api_key: &str) -> String {
    let digest = hex::encode(Sha256::digest(api_key.as_bytes()));
    format!("api_key_{}", &digest[..16])
}

/// Authenticate a request using an API key.
pub fn authenticate_api_key(config: &AuthConfig, api_key: &str) -> ApiResult<AuthContext> {
    let role = config
        .api_key_role(api_key)
        .ok_or_else(|| ApiError::unauthorized("Invalid API key"))?;

    let subject = api_key_subject(api_key);

    Ok(AuthContext::new(
        subject,
        role.map(str::to_string),
        AuthMethod::ApiKey,
    ))
}

/// Authenticate a request using a JWT token.
pub fn authenticate_jwt(config: &AuthConfig, token: &str) -> ApiResult<AuthContext> {
    let claims = validate_jwt_token(config, token)?;
    let expires_at = chrono::Utc.timestamp_opt(claims.exp, 0).single();

    Ok(AuthContext {
        expires_at,
        ..AuthContext::new(claims.sub, claims.role, AuthMethod::Jwt)
    })
}

/// Authenticate using whichever credential is present, API key first.
pub fn authenticate(
    config: &AuthConfig,
    api_key_header: Option<&str>,
    auth_header: Option<&str>,
) -> ApiResult<AuthContext> {
    if let Some(api_key) = api_key_header {
        return authenticate_api_key(config, api_key);
    }

    if let Some(auth_value) = auth_header {
        return match auth_value.strip_prefix("Bearer ") {
            Some(token) => authenticate_jwt(config, token),
            None => Err(ApiError::invalid_token(
                "Authorization header must use Bearer scheme",
            )),
        };
    }

    Err(ApiError::unauthorized(
        "Authentication required: provide X-API-Key or Authorization header",
    ))
}

// ============================================================================
// TESTS
// ============================================================================
