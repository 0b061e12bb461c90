//! REST API Routes Module
//!
//! Includes:
//! - Content reads (public) and cache operations (role-gated)
//! - Session identity for client-side guards
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod content;
pub mod health;
pub mod session;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::gateway::CacheSyncGateway;
use crate::middleware::{auth_middleware, rate_limit_middleware, AuthMiddlewareState, RateLimitState};
use crate::openapi::ApiDoc;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use session::create_router as session_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

fn is_production_environment() -> bool {
    std::env::var("MARQUEE_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if !config.has_origin_allowlist() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set MARQUEE_CORS_ORIGINS.",
        ));
    }
    if !config.rate_limit_enabled {
        tracing::warn!(
            "Rate limiting is disabled in production. Set MARQUEE_RATE_LIMIT_ENABLED=true."
        );
    }
    Ok(())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builder for the full router with auth and rate limiting wired in.
///
/// Content reads, health and metrics are public but rate-limited. Cache
/// operations and the session endpoint require a credential, and the rate
/// limiter on those routes runs after auth so it can key on the principal.
pub struct SecureRouterBuilder {
    gateway: CacheSyncGateway,
    api_config: ApiConfig,
    auth_state: AuthMiddlewareState,
    rate_limit_state: RateLimitState,
}

impl SecureRouterBuilder {
    /// Fails in production when CORS or auth secrets are left at defaults.
    pub fn new(
        gateway: CacheSyncGateway,
        api_config: ApiConfig,
        auth_config: AuthConfig,
    ) -> ApiResult<Self> {
        if is_production_environment() {
            auth_config.validate_for_production()?;
            validate_api_config_for_production(&api_config)?;
        }

        let auth_state = AuthMiddlewareState::new(auth_config);
        let rate_limit_state = RateLimitState::new(api_config.clone());

        Ok(Self {
            gateway,
            api_config,
            auth_state,
            rate_limit_state,
        })
    }

    fn build_public_routes(&self) -> Router {
        Router::new()
            .nest("/api/v1/content", content::public_router(self.gateway.clone()))
            .nest("/health", health::create_router(self.gateway.clone()))
            .route("/metrics", get(metrics_handler))
            .route("/openapi.json", get(openapi_json))
            .layer(from_fn_with_state(self.rate_limit_state.clone(), rate_limit_middleware))
    }

    fn build_protected_routes(&self) -> Router {
        Router::new()
            .nest("/api/v1/content", content::protected_router(self.gateway.clone()))
            .nest("/api/v1/session", session::create_router())
            .layer(from_fn_with_state(self.rate_limit_state.clone(), rate_limit_middleware))
            .layer(from_fn_with_state(self.auth_state.clone(), auth_middleware))
    }

    /// # Middleware Order (outer to inner)
    /// 1. CORS - answers preflight requests
    /// 2. Observability - tracing and metrics
    /// 3. Auth (protected routes only)
    /// 4. Rate limiting
    /// 5. Role requirement (per route)
    pub fn build(self) -> Router {
        let mut router = self.build_public_routes().merge(self.build_protected_routes());

        #[cfg(feature = "swagger-ui")]
        {
            use utoipa_swagger_ui::SwaggerUi;
            router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
        }

        let cors = build_cors_layer(&self.api_config);

        router.layer(from_fn(observability_middleware)).layer(cors)
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Any origin when no allowlist is configured; otherwise exact or
/// `*.domain` matches only.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-api-key"),
        ])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if !config.has_origin_allowlist() {
        tracing::info!("CORS: no allowlist configured, allowing all origins");
        return cors.allow_origin(Any);
    }

    tracing::info!(origins = ?config.cors_origins, "CORS: allowlist in effect");
    let allowlist = config.clone();
    let cors = cors.allow_origin(AllowOrigin::predicate(move |origin, _parts| {
        origin
            .to_str()
            .map(|o| allowlist.is_origin_allowed(o))
            .unwrap_or(false)
    }));

    if config.cors_allow_credentials {
        cors.allow_credentials(true)
    } else {
        cors
    }
}

/// Create the complete API router.
///
/// - `GET /api/v1/content`, `GET /api/v1/content/:key` (public)
/// - `POST /api/v1/content/push`, `DELETE /api/v1/content/cache` (admin)
/// - `GET /api/v1/content/stats` (manager)
/// - `GET /api/v1/session` (any credential)
/// - `/health/*`, `/metrics`, `/openapi.json` (public)
/// - `/swagger-ui` when the swagger-ui feature is enabled
pub fn create_api_router(
    gateway: CacheSyncGateway,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    SecureRouterBuilder::new(gateway, api_config.clone(), auth_config).map(SecureRouterBuilder::build)
}

/// Serve `app` until `shutdown` resolves. Connections accepted before the
/// signal are allowed to finish their in-flight requests.
pub async fn serve_until<F>(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: F,
) -> ApiResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))
}
