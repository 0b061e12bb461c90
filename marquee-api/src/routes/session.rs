//! Session REST Route
//!
//! `GET /api/v1/session` reports the caller's resolved identity. This is the
//! endpoint client-side session guards poll; the server only interprets an
//! already-authenticated credential.

use axum::{routing::get, Json, Router};
use marquee_core::SessionInfo;

use crate::{error::ApiError, middleware::AuthExtractor};

/// GET /api/v1/session - Resolved identity of the caller
#[utoipa::path(
    get,
    path = "/api/v1/session",
    tag = "Session",
    responses(
        (status = 200, description = "Authenticated identity", body = SessionInfo),
        (status = 401, description = "No valid credential", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn current_session(auth: AuthExtractor) -> Json<SessionInfo> {
    Json(auth.session_info())
}

/// Relative to `/api/v1/session`; requires `auth_middleware` above it.
pub fn create_router() -> Router {
    Router::new().route("/", get(current_session))
}
