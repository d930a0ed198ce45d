//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - HTTP request counts and latency by method, route and status
//! - OAuth tokens issued by grant type
//! - Bearer token validations by outcome
//! - Active gateway connections
//! - Gateway events delivered by event name

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "oauth_server";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Tokens minted, labelled by grant type
pub static OAUTH_TOKENS_ISSUED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("oauth_tokens_issued_total", "Access tokens issued").namespace(NAMESPACE),
        &["grant_type"],
    )
    .expect("Failed to create OAUTH_TOKENS_ISSUED_TOTAL metric")
});

/// Bearer validations, labelled "valid", "invalid", "expired", "revoked", "inactive_app"
pub static OAUTH_BEARER_VALIDATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "oauth_bearer_validations_total",
            "Bearer token validations by outcome",
        )
        .namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create OAUTH_BEARER_VALIDATIONS_TOTAL metric")
});

pub static GATEWAY_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "gateway_connections_active",
            "Number of registered gateway connections",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create GATEWAY_CONNECTIONS_ACTIVE metric")
});

pub static GATEWAY_EVENTS_DELIVERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gateway_events_delivered_total",
            "Event frames queued to gateway connections",
        )
        .namespace(NAMESPACE),
        &["event"],
    )
    .expect("Failed to create GATEWAY_EVENTS_DELIVERED_TOTAL metric")
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(OAUTH_TOKENS_ISSUED_TOTAL.clone()))
        .expect("Failed to register OAUTH_TOKENS_ISSUED_TOTAL");
    registry
        .register(Box::new(OAUTH_BEARER_VALIDATIONS_TOTAL.clone()))
        .expect("Failed to register OAUTH_BEARER_VALIDATIONS_TOTAL");
    registry
        .register(Box::new(GATEWAY_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register GATEWAY_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(GATEWAY_EVENTS_DELIVERED_TOTAL.clone()))
        .expect("Failed to register GATEWAY_EVENTS_DELIVERED_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_token_issued(grant_type: &str) {
    OAUTH_TOKENS_ISSUED_TOTAL.with_label_values(&[grant_type]).inc();
}

pub fn record_bearer_validation(outcome: &str) {
    OAUTH_BEARER_VALIDATIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

pub fn set_gateway_connections(count: usize) {
    GATEWAY_CONNECTIONS_ACTIVE.set(count as i64);
}

pub fn record_event_delivered(event: &str, deliveries: usize) {
    GATEWAY_EVENTS_DELIVERED_TOTAL
        .with_label_values(&[event])
        .inc_by(deliveries as u64);
}
