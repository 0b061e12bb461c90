//! HTTP surface configuration: CORS and rate limiting.
//!
//! Loaded from `MARQUEE_*` environment variables with development defaults.

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86_400;
const DEFAULT_RATE_LIMIT_ANONYMOUS: u32 = 120;
const DEFAULT_RATE_LIMIT_AUTHENTICATED: u32 = 1_200;
const DEFAULT_RATE_LIMIT_BURST: u32 = 20;

/// CORS and rate limiting settings for the HTTP server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,

    /// Whether CORS responses allow credentials.
    pub cors_allow_credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub cors_max_age_secs: u64,

    pub rate_limit_enabled: bool,

    /// Requests per minute for callers without credentials, keyed by IP.
    pub rate_limit_anonymous: u32,

    /// Requests per minute for authenticated callers, keyed by principal.
    pub rate_limit_authenticated: u32,

    /// Requests allowed beyond the steady rate in a burst.
    pub rate_limit_burst: u32,

    pub rate_limit_window: Duration,

    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
    /// Empty means the socket address is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            rate_limit_enabled: true,
            rate_limit_anonymous: DEFAULT_RATE_LIMIT_ANONYMOUS,
            rate_limit_authenticated: DEFAULT_RATE_LIMIT_AUTHENTICATED,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            rate_limit_window: Duration::from_secs(60),
            trusted_proxies: Vec::new(),
        }
    }
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn parse_ip_list(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(value = s, "Ignoring invalid trusted proxy address");
                None
            }
        })
        .collect()
}

impl ApiConfig {
    /// Environment variables:
    /// - `MARQUEE_CORS_ORIGINS`: comma-separated origins (empty = allow all)
    /// - `MARQUEE_CORS_ALLOW_CREDENTIALS`: default false
    /// - `MARQUEE_CORS_MAX_AGE_SECS`: default 86400
    /// - `MARQUEE_RATE_LIMIT_ENABLED`: default true
    /// - `MARQUEE_RATE_LIMIT_ANONYMOUS`: per IP per minute, default 120
    /// - `MARQUEE_RATE_LIMIT_AUTHENTICATED`: per principal per minute, default 1200
    /// - `MARQUEE_RATE_LIMIT_BURST`: default 20
    /// - `MARQUEE_TRUSTED_PROXIES`: comma-separated proxy IPs (default none)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("MARQUEE_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_allow_credentials: env_flag("MARQUEE_CORS_ALLOW_CREDENTIALS")
                .unwrap_or(defaults.cors_allow_credentials),
            cors_max_age_secs: env_parsed("MARQUEE_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            rate_limit_enabled: std::env::var("MARQUEE_RATE_LIMIT_ENABLED")
                .map(|s| s.trim().to_lowercase() != "false")
                .unwrap_or(defaults.rate_limit_enabled),
            rate_limit_anonymous: env_parsed("MARQUEE_RATE_LIMIT_ANONYMOUS")
                .unwrap_or(defaults.rate_limit_anonymous),
            rate_limit_authenticated: env_parsed("MARQUEE_RATE_LIMIT_AUTHENTICATED")
                .unwrap_or(defaults.rate_limit_authenticated),
            rate_limit_burst: env_parsed("MARQUEE_RATE_LIMIT_BURST")
                .unwrap_or(defaults.rate_limit_burst),
            rate_limit_window: defaults.rate_limit_window,
            trusted_proxies: std::env::var("MARQUEE_TRUSTED_PROXIES")
                .map(|s| parse_ip_list(&s))
                .unwrap_or_default(),
        }
    }

    /// Strict CORS is in effect whenever an origin list is configured.
    pub fn has_origin_allowlist(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Exact match, or `*.example.com` matching any https subdomain.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            match (allowed.strip_prefix("*."), origin.strip_prefix("https://")) {
                (Some(suffix), Some(host)) => host.ends_with(&format!(".{}", suffix)),
                _ => false,
            }
        })
    }
}
