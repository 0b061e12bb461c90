//! Marquee API Server Entry Point
//!
//! Reads configuration from the environment, builds the content store and
//! the process-wide content cache, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use marquee_api::telemetry::{init_tracing, TelemetryConfig};
use marquee_api::{
    create_api_router, serve_until, ApiConfig, ApiError, ApiResult, AuthConfig, CacheSyncGateway,
    DbClient, DbConfig,
};
use marquee_storage::{ContentCache, ContentCacheConfig, ContentStore, InMemoryContentStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    if telemetry_config.is_production() {
        tracing::warn!(
            "Each instance keeps its own content cache; pushes must be replayed against every instance"
        );
    }

    let store = build_store().await?;
    let gateway = CacheSyncGateway::new(ContentCache::new(store, ContentCacheConfig::from_env()));

    if env_flag("MARQUEE_WARM_CACHE") {
        match gateway.cache().hydrate_from_store().await {
            Ok(snapshot) => tracing::info!(sections = snapshot.len(), "Content cache warmed"),
            Err(e) => tracing::warn!(error = %e, "Cache warm-up failed; first read will retry"),
        }
    }

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let app: Router = create_api_router(gateway, &api_config, auth_config)?;

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting marquee API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    serve_until(listener, app, shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM. In-flight requests finish before the
/// server returns.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received; draining in-flight requests");
}

async fn build_store() -> ApiResult<Arc<dyn ContentStore>> {
    let kind = std::env::var("MARQUEE_STORE").unwrap_or_else(|_| "postgres".to_string());
    match kind.to_lowercase().as_str() {
        "memory" => {
            tracing::warn!("Using in-memory content store; content is lost on restart");
            Ok(Arc::new(InMemoryContentStore::new()))
        }
        "postgres" => {
            let db = DbClient::from_config(&DbConfig::from_env())?;
            db.ensure_schema().await?;
            Ok(Arc::new(db))
        }
        other => Err(ApiError::invalid_input(format!(
            "Unknown MARQUEE_STORE value: {} (expected postgres or memory)",
            other
        ))),
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("MARQUEE_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("MARQUEE_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
