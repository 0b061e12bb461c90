//! Axum middleware for the marquee API.
//!
//! Layer order on authenticated routers (outermost last):
//!
//! ```ignore
//! Router::new()
//!     .route("/api/v1/content/cache", delete(reset_cache))
//!     .layer(middleware::from_fn_with_state(Role::Admin, require_role))
//!     .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//! ```
//!
//! Authentication runs first so the rate limiter can key on the principal.

mod auth;

pub use auth::{
    auth_middleware, extract_auth_context, rate_limit_middleware, require_role, AuthExtractor,
    AuthMiddlewareError, AuthMiddlewareState, RateLimitError, RateLimitKey, RateLimitState,
};
