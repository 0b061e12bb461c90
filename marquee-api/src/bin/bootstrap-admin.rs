//! Ensure an administrator account exists in the Postgres store.
//!
//! Usage:
//!   MARQUEE_ADMIN_EMAIL=ops@example.com MARQUEE_ADMIN_PASSWORD=... \
//!     cargo run -p marquee-api --bin bootstrap-admin
//!
//! Safe to run repeatedly. Set MARQUEE_ADMIN_RESET_PASSWORD=true to replace
//! the password of an existing account.

use marquee_api::telemetry::{init_tracing, TelemetryConfig};
use marquee_api::{ApiError, ApiResult, DbClient, DbConfig};
use marquee_core::{AdminBootstrap, BootstrapOutcome};
use marquee_storage::{bootstrap_admin, BootstrapError};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let input = AdminBootstrap {
        email: required_env("MARQUEE_ADMIN_EMAIL")?,
        password: required_env("MARQUEE_ADMIN_PASSWORD")?,
        display_name: std::env::var("MARQUEE_ADMIN_NAME").unwrap_or_default(),
        reset_password: std::env::var("MARQUEE_ADMIN_RESET_PASSWORD")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false),
    };

    let db = DbClient::from_config(&DbConfig::from_env())?;
    db.ensure_schema().await?;

    let outcome = bootstrap_admin(&db, &input).await.map_err(|e| match e {
        BootstrapError::Validation(v) => ApiError::from(v),
        BootstrapError::Store(s) => ApiError::from(s),
        BootstrapError::Hash(reason) => ApiError::internal_error(reason),
    })?;

    let summary = match outcome {
        BootstrapOutcome::Created => "created",
        BootstrapOutcome::Promoted => "promoted",
        BootstrapOutcome::Unchanged => "unchanged",
    };
    tracing::info!(email = %input.normalized_email(), outcome = summary, "Administrator bootstrap finished");
    println!("{}: {}", input.normalized_email(), summary);
    Ok(())
}

fn required_env(key: &str) -> ApiResult<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field(key))
}
