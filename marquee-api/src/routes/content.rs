//! Content REST Routes
//!
//! Public reads and privileged cache operations, all backed by the
//! [`CacheSyncGateway`]:
//!
//! - `GET    /api/v1/content`        read everything (public)
//! - `GET    /api/v1/content/:key`   read one section (public)
//! - `POST   /api/v1/content/push`   replace the cache (admin, checked after validation)
//! - `DELETE /api/v1/content/cache`  drop the snapshot (admin)
//! - `GET    /api/v1/content/stats`  cache counters (manager)

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use marquee_core::Role;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    gateway::CacheSyncGateway,
    middleware::{require_role, AuthExtractor},
    types::{
        CacheStatsResponse, PushContentRequest, PushContentResponse, ReadContentResponse,
        ResetCacheResponse, SectionResponse,
    },
};

// ============================================================================
// SHARED STATE
// ============================================================================

#[derive(Clone)]
pub struct ContentState {
    pub gateway: CacheSyncGateway,
}

impl ContentState {
    pub fn new(gateway: CacheSyncGateway) -> Self {
        Self { gateway }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/content - Read all content
#[utoipa::path(
    get,
    path = "/api/v1/content",
    tag = "Content",
    responses(
        (status = 200, description = "Content served from cache or freshly hydrated", body = ReadContentResponse),
        (status = 503, description = "Store unreachable and nothing cached", body = ReadContentResponse),
    ),
)]
pub async fn read_content(State(state): State<Arc<ContentState>>) -> Response {
    let read = state.gateway.read().await;
    let status = if read.is_available() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadContentResponse::from(&read))).into_response()
}

/// GET /api/v1/content/:key - Read one section
#[utoipa::path(
    get,
    path = "/api/v1/content/{key}",
    tag = "Content",
    params(
        ("key" = String, Path, description = "Section key, e.g. hero")
    ),
    responses(
        (status = 200, description = "Section found", body = SectionResponse),
        (status = 404, description = "No such section", body = ApiError),
        (status = 503, description = "Store unreachable and nothing cached", body = ApiError),
    ),
)]
pub async fn read_section(
    State(state): State<Arc<ContentState>>,
    Path(key): Path<String>,
) -> ApiResult<Json<SectionResponse>> {
    let read = state.gateway.read_section(&key).await;

    if let Some(e) = read.error {
        return Err(ApiError::service_unavailable(format!("Content unavailable: {}", e)));
    }
    let payload = read.payload.ok_or_else(|| ApiError::section_not_found(&key))?;

    let timestamp = read.taken_at.unwrap_or_else(Utc::now);

    Ok(Json(SectionResponse {
        success: true,
        key,
        payload,
        source: read.source,
        timestamp,
    }))
}

/// POST /api/v1/content/push - Replace the cached content
#[utoipa::path(
    post,
    path = "/api/v1/content/push",
    tag = "Content",
    request_body = PushContentRequest,
    responses(
        (status = 200, description = "Snapshot installed", body = PushContentResponse),
        (status = 400, description = "Missing, empty or malformed content", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Principal below admin", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn push_content(
    State(state): State<Arc<ContentState>>,
    AuthExtractor(auth): AuthExtractor,
    body: Bytes,
) -> ApiResult<Json<PushContentResponse>> {
    let receipt = state
        .gateway
        .push_json(&auth.subject, auth.principal_role(), &body)?;
    Ok(Json(PushContentResponse::from(&receipt)))
}

/// DELETE /api/v1/content/cache - Drop the snapshot so the next read hydrates
#[utoipa::path(
    delete,
    path = "/api/v1/content/cache",
    tag = "Content",
    responses(
        (status = 200, description = "Cache reset", body = ResetCacheResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Principal below admin", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn reset_cache(
    State(state): State<Arc<ContentState>>,
    AuthExtractor(auth): AuthExtractor,
) -> Json<ResetCacheResponse> {
    state.gateway.reset(&auth.subject);
    Json(ResetCacheResponse {
        success: true,
        message: "Content cache cleared; next read hydrates from the store".to_string(),
        timestamp: Utc::now(),
    })
}

/// GET /api/v1/content/stats - Cache counters
#[utoipa::path(
    get,
    path = "/api/v1/content/stats",
    tag = "Content",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStatsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Principal below manager", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn cache_stats(State(state): State<Arc<ContentState>>) -> Json<CacheStatsResponse> {
    let cache = state.gateway.cache();
    Json(CacheStatsResponse::new(&cache.stats(), cache.is_populated()))
}

// ============================================================================
// ROUTERS
// ============================================================================

/// Unauthenticated read routes, relative to `/api/v1/content`.
pub fn public_router(gateway: CacheSyncGateway) -> Router {
    let state = Arc::new(ContentState::new(gateway));

    Router::new()
        .route("/", get(read_content))
        .route("/:key", get(read_section))
        .with_state(state)
}

/// Routes that need an authenticated principal, relative to
/// `/api/v1/content`. The caller layers `auth_middleware` on top.
pub fn protected_router(gateway: CacheSyncGateway) -> Router {
    let state = Arc::new(ContentState::new(gateway));

    Router::new()
        .route("/push", post(push_content))
        .route(
            "/cache",
            delete(reset_cache).route_layer(from_fn_with_state(Role::Admin, require_role)),
        )
        .route(
            "/stats",
            get(cache_stats).route_layer(from_fn_with_state(Role::Manager, require_role)),
        )
        .with_state(state)
}
