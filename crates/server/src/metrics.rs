//! Prometheus metrics for the beacon server.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no session or share ids, only aggregate counts.
//!
//! **Deployment Requirement**: The `/metrics` endpoint MUST be network-restricted
//! to authorized Prometheus scraper IPs only. This should be enforced at the
//! infrastructure level (firewall, load balancer, or reverse proxy rules).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static SESSIONS_CREATED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "beacon_sessions_created_total",
            "Total number of sharing sessions created by mode",
        ),
        &["mode"],
    )
    .expect("metric creation failed")
});

pub static POINTS_POSTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "beacon_points_posted_total",
        "Total number of location points accepted",
    )
    .expect("metric creation failed")
});

pub static FETCHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "beacon_fetches_total",
            "Total number of successful share fetches by share kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static ADOPTIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "beacon_adoptions_total",
        "Total number of solo shares adopted into groups",
    )
    .expect("metric creation failed")
});

pub static STOPS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("beacon_stops_total", "Total number of stop requests")
        .expect("metric creation failed")
});

pub static RATE_LIMITED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "beacon_rate_limited_total",
            "Total number of requests rejected by a rate limit guard",
        ),
        &["guard"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(SESSIONS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(POINTS_POSTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FETCHES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ADOPTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STOPS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RATE_LIMITED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

pub fn record_session_created(mode: &str) {
    SESSIONS_CREATED.with_label_values(&[mode]).inc();
}

pub fn record_fetch(kind: &str) {
    FETCHES.with_label_values(&[kind]).inc();
}

pub fn record_rate_limited(guard: &str) {
    RATE_LIMITED.with_label_values(&[guard]).inc();
}
