//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the scorebridge server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Predictor status (collected dynamically)
//! - Core provisioning and prediction metrics

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scorebridge_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scorebridge_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scorebridge_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Predictor Metrics (collected dynamically)
// =============================================================================

/// Whether a recognition request currently holds the pipeline (1) or not (0).
pub static PREDICTOR_BUSY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scorebridge_predictor_busy",
        "Whether a recognition request is running (1) or not (0)",
    )
    .unwrap()
});

/// Whether the checkpoint sentinel is present (1) or missing (0).
pub static CHECKPOINTS_READY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scorebridge_checkpoints_ready",
        "Whether model checkpoints are present on disk",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Predictor
    registry.register(Box::new(PREDICTOR_BUSY.clone())).unwrap();
    registry
        .register(Box::new(CHECKPOINTS_READY.clone()))
        .unwrap();

    // Core metrics (provisioning, predictions)
    for metric in scorebridge_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.predictor().status();
    PREDICTOR_BUSY.set(if status.busy { 1 } else { 0 });
    CHECKPOINTS_READY.set(if state.sentinel().exists() { 1 } else { 0 });
}
