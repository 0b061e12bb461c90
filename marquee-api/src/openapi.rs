//! OpenAPI document for the marquee API, generated by utoipa from the
//! handler annotations in `routes` and `telemetry`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::{content, health, session};
use crate::telemetry::metrics;
use crate::types::{
    CacheStatsResponse, PushContentRequest, PushContentResponse, ReadContentResponse,
    ResetCacheResponse, SectionResponse,
};

use marquee_core::{ContentSection, ReadSource, Role, SessionInfo, SessionStatus, SnapshotSource};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Marquee API",
        version = "0.1.0",
        description = "Site content served from an in-process cache with role-gated cache control",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Content", description = "Public content reads and privileged cache operations"),
        (name = "Session", description = "Resolved identity of the caller"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        content::read_content,
        content::read_section,
        content::push_content,
        content::reset_cache,
        content::cache_stats,
        session::current_session,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ErrorCode, ApiError,
            ReadContentResponse, SectionResponse,
            PushContentRequest, PushContentResponse,
            ResetCacheResponse, CacheStatsResponse,
            health::HealthResponse, health::HealthStatus, health::HealthDetails, health::ComponentHealth,
            ContentSection, ReadSource, SnapshotSource,
            Role, SessionInfo, SessionStatus
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
