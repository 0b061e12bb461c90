use marquee_api::auth::{AuthConfig, JwtSecret};

pub const ADMIN_KEY: &str = "admin_key_0001";
pub const MANAGER_KEY: &str = "manager_key_0001";
pub const EMPLOYEE_KEY: &str = "employee_key_0001";
/// Authenticates, but carries no role.
pub const BARE_KEY: &str = "bare_key_0001";

/// Auth config with one API key per role and a fixed JWT secret.
pub fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.add_api_key(ADMIN_KEY, Some("admin"));
    config.add_api_key(MANAGER_KEY, Some("manager"));
    config.add_api_key(EMPLOYEE_KEY, Some("employee"));
    config.add_api_key(BARE_KEY, None);
    config.jwt_secret =
        JwtSecret::new("test_secret_for_integration_tests_0123456789".to_string())
            .expect("Failed to build JWT secret");
    config
}
