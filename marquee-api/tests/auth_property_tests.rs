//! Property-Based Tests for Authentication and Role Enforcement
//!
//! For any request to a protected route:
//! - without a valid credential the API returns 401 Unauthorized
//! - with a valid credential whose role ranks below the route's requirement
//!   (or no recognized role) the API returns 403 Forbidden
//! - otherwise the request reaches the handler

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use marquee_api::{
    auth::{generate_jwt_token, AuthConfig},
    middleware::{auth_middleware, require_role, AuthMiddlewareState},
};
use marquee_core::Role;
use marquee_test_utils::generators::{arb_role, arb_role_string};
use proptest::prelude::*;
use tower::ServiceExt;

#[path = "support/auth.rs"]
mod auth_support;

use auth_support::{test_auth_config, ADMIN_KEY, BARE_KEY, EMPLOYEE_KEY, MANAGER_KEY};

// ============================================================================
// TEST APP
// ============================================================================

/// One route per required role, all behind auth.
fn test_app(config: AuthConfig) -> Router {
    let mut router = Router::new().route("/api/v1/any", get(|| async { "Success" }));
    for role in Role::ALL {
        router = router.route(
            &format!("/api/v1/{}", role.as_str()),
            get(|| async { "Success" })
                .route_layer(middleware::from_fn_with_state(role, require_role)),
        );
    }
    router.layer(middleware::from_fn_with_state(
        AuthMiddlewareState::new(config),
        auth_middleware,
    ))
}

// ============================================================================
// STRATEGIES
// ============================================================================

#[derive(Debug, Clone)]
enum Credential {
    /// Configured API key and the role string it maps to.
    ApiKey(&'static str, Option<&'static str>),
    InvalidApiKey(String),
    /// JWT signed with the configured secret, carrying an arbitrary role claim.
    Jwt { subject: String, role: Option<String> },
    InvalidJwt(String),
    NonBearer(String),
    None,
}

fn credential_strategy() -> impl Strategy<Value = Credential> {
    prop_oneof![
        prop_oneof![
            Just(Credential::ApiKey(ADMIN_KEY, Some("admin"))),
            Just(Credential::ApiKey(MANAGER_KEY, Some("manager"))),
            Just(Credential::ApiKey(EMPLOYEE_KEY, Some("employee"))),
            Just(Credential::ApiKey(BARE_KEY, None)),
        ],
        "[a-z0-9_]{10,30}".prop_map(Credential::InvalidApiKey),
        ("[a-z0-9]{5,20}", proptest::option::of(arb_role_string()))
            .prop_map(|(subject, role)| Credential::Jwt { subject, role }),
        "[A-Za-z0-9_-]{20,60}\\.[A-Za-z0-9_-]{20,60}\\.[A-Za-z0-9_-]{20,60}"
            .prop_map(Credential::InvalidJwt),
        "(Basic|Token|Digest) [A-Za-z0-9_-]{20,50}".prop_map(Credential::NonBearer),
        Just(Credential::None),
    ]
}

fn target_strategy() -> impl Strategy<Value = Option<Role>> {
    proptest::option::of(arb_role())
}

/// What the request should produce given the credential and the route's
/// requirement (`None` = any authenticated principal).
fn expected_status(credential: &Credential, required: Option<Role>) -> StatusCode {
    let role: Option<&str> = match credential {
        Credential::ApiKey(_, role) => *role,
        Credential::Jwt { role, .. } => role.as_deref(),
        _ => return StatusCode::UNAUTHORIZED,
    };
    let Some(required) = required else {
        return StatusCode::OK;
    };
    match role.and_then(|r| r.parse::<Role>().ok()) {
        Some(actual) if actual.rank() >= required.rank() => StatusCode::OK,
        _ => StatusCode::FORBIDDEN,
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_authentication_and_role_enforcement(
        credential in credential_strategy(),
        required in target_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = test_auth_config();
            let uri = match required {
                Some(role) => format!("/api/v1/{}", role.as_str()),
                None => "/api/v1/any".to_string(),
            };
            let mut builder = Request::builder().uri(uri);

            match &credential {
                Credential::ApiKey(key, _) => builder = builder.header("x-api-key", *key),
                Credential::InvalidApiKey(key) => builder = builder.header("x-api-key", key),
                Credential::Jwt { subject, role } => {
                    let token = generate_jwt_token(&config, subject, role.as_deref()).unwrap();
                    builder = builder.header("authorization", format!("Bearer {}", token));
                }
                Credential::InvalidJwt(token) => {
                    builder = builder.header("authorization", format!("Bearer {}", token));
                }
                Credential::NonBearer(value) => builder = builder.header("authorization", value),
                Credential::None => {}
            }

            let response = test_app(config)
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();

            prop_assert_eq!(
                response.status(),
                expected_status(&credential, required),
                "credential {:?} against {:?}",
                credential,
                required
            );
            Ok(())
        })?;
    }

    #[test]
    fn prop_rank_monotonic_through_pipeline(holder in arb_role(), required in arb_role()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = test_auth_config();
            let token = generate_jwt_token(&config, "editor", Some(holder.as_str())).unwrap();
            let app = test_app(config);

            let mut allowed = Vec::new();
            for role in Role::ALL {
                let request = Request::builder()
                    .uri(format!("/api/v1/{}", role.as_str()))
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap();
                let status = app.clone().oneshot(request).await.unwrap().status();
                allowed.push((role, status == StatusCode::OK));
            }

            // Allowed for `required` implies allowed for everything ranked below it.
            let required_ok = allowed.iter().any(|(r, ok)| *r == required && *ok);
            if required_ok {
                for (role, ok) in &allowed {
                    if role.rank() <= required.rank() {
                        prop_assert!(*ok, "{:?} allowed {:?} but not {:?}", holder, required, role);
                    }
                }
            }
            prop_assert_eq!(required_ok, holder.rank() >= required.rank());
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn test_credentials_are_evaluated_per_request() {
    let config = test_auth_config();
    let app = test_app(config.clone());
    let admin = generate_jwt_token(&config, "a", Some("admin")).unwrap();

    let ok = Request::builder()
        .uri("/api/v1/admin")
        .header("authorization", format!("Bearer {}", admin))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(ok).await.unwrap().status(), StatusCode::OK);

    let anonymous = Request::builder()
        .uri("/api/v1/admin")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.oneshot(anonymous).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );
}
