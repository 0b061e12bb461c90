//! Axum middleware for authentication, role filtering and rate limiting.
//!
//! - `auth_middleware` authenticates X-API-Key or Bearer credentials and
//!   injects [`AuthContext`] into request extensions (401 on failure)
//! - `require_role` is the request-pipeline form of [`PermissionGate`]
//!   (403 on deny)
//! - `rate_limit_middleware` enforces per-IP / per-principal quotas (429)

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header::HeaderName, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{DefaultClock, QuantaInstant},
    DefaultKeyedRateLimiter, NotUntil, Quota, RateLimiter,
};
use marquee_core::{PermissionGate, Role};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Authenticate the request and inject [`AuthContext`].
///
/// ```ignore
/// let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
/// let app = Router::new()
///     .route("/api/v1/session", get(current_session))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let api_key_header = request
        .headers()
        .get("x-api-key")
        .and_then(|h| h.to_str().ok());

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let auth_context =
        authenticate(&state.auth_config, api_key_header, auth_header).map_err(AuthMiddlewareError)?;

    tracing::debug!(
        subject = %auth_context.subject,
        role = auth_context.role.as_deref().unwrap_or("-"),
        method = ?auth_context.auth_method,
        "Authenticated request"
    );

    request.extensions_mut().insert(auth_context);
    Ok(next.run(request).await)
}

// ============================================================================
// ROLE FILTER
// ============================================================================

/// Reject the request unless the authenticated principal holds at least
/// `required`. Must run after [`auth_middleware`].
///
/// ```ignore
/// Router::new()
///     .route("/api/v1/content/cache", delete(reset_cache))
///     .layer(middleware::from_fn_with_state(Role::Admin, require_role))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn require_role(
    State(required): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth = extract_auth_context(&request).map_err(AuthMiddlewareError)?;

    if let Err(denied) = PermissionGate::authorize(auth.principal_role(), required) {
        tracing::warn!(
            subject = %auth.subject,
            role = auth.role.as_deref().unwrap_or("-"),
            required = %required,
            path = %request.uri().path(),
            "Role requirement not met"
        );
        return Err(AuthMiddlewareError(denied.into()));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Middleware rejection rendered as a JSON [`ApiError`].
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        (status, Json(self.0)).into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Handler extractor for the authenticated principal.
///
/// Yields 500 when `auth_middleware` was not applied to the route.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Borrow the [`AuthContext`] injected by [`auth_middleware`].
pub fn extract_auth_context(request: &Request) -> ApiResult<&AuthContext> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Auth context missing from request"))
}

// ============================================================================
// RATE LIMITING
// ============================================================================

type KeyedLimiter<K> = DefaultKeyedRateLimiter<K>;

/// Idle buckets are swept after this many checks.
const SWEEP_EVERY: u64 = 1_024;

/// Rate limit bucket: anonymous callers by IP, authenticated by principal.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    Ip(IpAddr),
    Principal(String),
}

/// Shared state for [`rate_limit_middleware`].
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<ApiConfig>,
    anonymous: Arc<KeyedLimiter<IpAddr>>,
    authenticated: Arc<KeyedLimiter<String>>,
    checks: Arc<AtomicU64>,
}

fn quota(per_minute: u32, burst: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}

impl RateLimitState {
    pub fn new(config: ApiConfig) -> Self {
        let burst = config.rate_limit_burst;
        Self {
            anonymous: Arc::new(RateLimiter::dashmap(quota(config.rate_limit_anonymous, burst))),
            authenticated: Arc::new(RateLimiter::dashmap(quota(
                config.rate_limit_authenticated,
                burst,
            ))),
            config: Arc::new(config),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    fn per_minute(&self, key: &RateLimitKey) -> u32 {
        match key {
            RateLimitKey::Ip(_) => self.config.rate_limit_anonymous,
            RateLimitKey::Principal(_) => self.config.rate_limit_authenticated,
        }
    }

    fn check(&self, key: &RateLimitKey) -> Result<(), NotUntil<QuantaInstant>> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_idle();
        }
        match key {
            RateLimitKey::Ip(ip) => self.anonymous.check_key(ip),
            RateLimitKey::Principal(subject) => self.authenticated.check_key(subject),
        }
    }

    /// Drop buckets that have refilled completely; they are
    /// indistinguishable from fresh ones.
    pub fn sweep_idle(&self) {
        self.anonymous.retain_recent();
        self.anonymous.shrink_to_fit();
        self.authenticated.retain_recent();
        self.authenticated.shrink_to_fit();
    }

    /// Number of buckets currently held.
    pub fn tracked_keys(&self) -> usize {
        self.anonymous.len() + self.authenticated.len()
    }
}

/// 429 rejection carrying a Retry-After hint.
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Client IP for anonymous rate limiting.
///
/// Proxy headers are honored only when the socket peer is a configured
/// trusted proxy. `X-Forwarded-For` is read right to left and the first
/// address that is not itself a trusted proxy wins.
fn client_ip(request: &Request, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> IpAddr {
    let Some(peer_ip) = peer.map(|addr| addr.ip()) else {
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };
    if !trusted.contains(&peer_ip) {
        return peer_ip;
    }

    let forwarded: Vec<IpAddr> = request
        .headers()
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|v| v.trim().parse::<IpAddr>().ok())
        .collect();
    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    forwarded
        .into_iter()
        .rev()
        .find(|ip| !trusted.contains(ip))
        .or_else(real_ip)
        .unwrap_or(peer_ip)
}

/// Enforce request quotas; adds `x-ratelimit-limit` to allowed responses.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let key = match request.extensions().get::<AuthContext>() {
        Some(auth) => RateLimitKey::Principal(auth.subject.clone()),
        None => RateLimitKey::Ip(client_ip(
            &request,
            connect_info.map(|c| c.0),
            &state.config.trusted_proxies,
        )),
    };

    if let Err(not_until) = state.check(&key) {
        let retry_after = not_until
            .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
            .as_secs()
            .max(1);
        tracing::warn!(key = ?key, retry_after, "Rate limit exceeded");
        return Err(RateLimitError { retry_after });
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(state.per_minute(&key)),
    );
    Ok(response)
}

// ============================================================================
// TESTS
// ============================================================================
