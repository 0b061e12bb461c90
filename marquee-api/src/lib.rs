//! Marquee API - HTTP Layer
//!
//! Serves site content out of the in-process [`marquee_storage::ContentCache`]
//! and exposes the privileged cache operations behind JWT / API-key
//! authentication and role checks. Postgres is the source of truth; the
//! cache hydrates from it lazily and is replaced wholesale by admin pushes.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_env;

pub use auth::{
    api_key_subject, authenticate, authenticate_api_key, authenticate_jwt, generate_jwt_token,
    validate_jwt_token,
    AuthConfig, AuthContext, AuthMethod, Claims,
};
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use gateway::{CacheSyncGateway, ContentRead, PushReceipt, SectionRead};
pub use middleware::{
    auth_middleware, extract_auth_context, rate_limit_middleware, require_role, AuthExtractor,
    AuthMiddlewareState, RateLimitState,
};
pub use openapi::ApiDoc;
pub use routes::{create_api_router, serve_until};
pub use types::*;
