//! Health Check Endpoints
//!
//! Kubernetes-compatible probes, no authentication:
//! - /health/ping - pong
//! - /health/live - process alive
//! - /health/ready - content can be served (cache populated or store reachable)

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::gateway::CacheSyncGateway;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthDetails {
    pub content_cache: ComponentHealth,
    /// Absent when the cache already holds a snapshot and the store was not checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<ComponentHealth>,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: Option<u64>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms,
            error: None,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct HealthState {
    pub gateway: CacheSyncGateway,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(gateway: CacheSyncGateway) -> Self {
        Self {
            gateway,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping
#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
)]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
)]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready
///
/// Ready when the cache already holds a snapshot, or the store answers a
/// connectivity check within the hydrate timeout. Never installs anything.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Content can be served", body = HealthResponse),
        (status = 503, description = "Cache empty and store unreachable", body = HealthResponse),
    ),
)]
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let cache = state.gateway.cache();

    let (cache_health, store_health) = if cache.is_populated() {
        (ComponentHealth::healthy(None), None)
    } else {
        (
            ComponentHealth::unhealthy("No snapshot installed"),
            Some(check_store(&state.gateway).await),
        )
    };

    let overall = if cache_health.status == HealthStatus::Healthy
        || store_health
            .as_ref()
            .is_some_and(|h| h.status == HealthStatus::Healthy)
    {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let response = HealthResponse {
        status: overall,
        message: None,
        details: Some(HealthDetails {
            content_cache: cache_health,
            store: store_health,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = match overall {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

async fn check_store(gateway: &CacheSyncGateway) -> ComponentHealth {
    let cache = gateway.cache();
    let start = Instant::now();
    match tokio::time::timeout(cache.config().hydrate_timeout, cache.store().ping()).await {
        Ok(Ok(_)) => ComponentHealth::healthy(Some(start.elapsed().as_millis() as u64)),
        Ok(Err(e)) => ComponentHealth::unhealthy(format!("Store check failed: {}", e)),
        Err(_) => ComponentHealth::unhealthy("Store check timed out"),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(gateway: CacheSyncGateway) -> Router {
    let state = Arc::new(HealthState::new(gateway));

    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}
