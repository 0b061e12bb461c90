//! Prometheus metrics for the marquee API, exposed at `GET /metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use marquee_core::ReadSource;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// 1ms .. 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Process-global metrics, registered with the default registry on first use.
pub static METRICS: Lazy<ApiResult<MarqueeMetrics>> = Lazy::new(MarqueeMetrics::new);

/// Registered metrics, or `None` if registration failed (logged once).
pub fn metrics() -> Option<&'static MarqueeMetrics> {
    static REPORTED: std::sync::Once = std::sync::Once::new();
    match METRICS.as_ref() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            REPORTED.call_once(|| tracing::error!(error = %e, "Metrics unavailable"));
            None
        }
    }
}

/// Outcome label for `marquee_content_pushes_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Applied,
    Invalid,
    Denied,
}

impl PushOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushOutcome::Applied => "applied",
            PushOutcome::Invalid => "invalid",
            PushOutcome::Denied => "denied",
        }
    }
}

#[derive(Clone)]
pub struct MarqueeMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// labels: source (cache | database | unavailable)
    pub content_reads_total: CounterVec,

    /// labels: status (success | failure)
    pub cache_hydrations_total: CounterVec,

    /// labels: status (applied | invalid | denied)
    pub content_pushes_total: CounterVec,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl MarqueeMetrics {
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "marquee_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "marquee_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            content_reads_total: register_counter_vec!(
                "marquee_content_reads_total",
                "Content reads by the source that answered them",
                &["source"]
            )
            .map_err(|e| registration_error("content_reads_total", e))?,

            cache_hydrations_total: register_counter_vec!(
                "marquee_cache_hydrations_total",
                "Cache hydrations triggered by reads",
                &["status"]
            )
            .map_err(|e| registration_error("cache_hydrations_total", e))?,

            content_pushes_total: register_counter_vec!(
                "marquee_content_pushes_total",
                "Content push attempts by outcome",
                &["status"]
            )
            .map_err(|e| registration_error("content_pushes_total", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_content_read(&self, source: ReadSource) {
        self.content_reads_total
            .with_label_values(&[source.as_str()])
            .inc();
    }

    pub fn record_hydration(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.cache_hydrations_total.with_label_values(&[status]).inc();
    }

    pub fn record_push(&self, outcome: PushOutcome) {
        self.content_pushes_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }
}

/// `GET /metrics` in Prometheus text format.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so the marquee families exist before the first scrape.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
