//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Checkpoint provisioning (downloads, bytes)
//! - Recognition requests (outcomes, latency)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Provisioning
// =============================================================================

/// Artifact downloads by result ("success" or the error kind).
pub static ARTIFACT_DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scorebridge_artifact_downloads_total",
            "Total checkpoint artifact downloads",
        ),
        &["result"],
    )
    .unwrap()
});

/// Checkpoint bytes written to disk.
pub static ARTIFACT_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scorebridge_artifact_bytes_total",
        "Total checkpoint bytes downloaded",
    )
    .unwrap()
});

// =============================================================================
// Predictions
// =============================================================================

/// Predictions by result ("success", "bad_input", "pipeline", "staging", "packaging").
pub static PREDICTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scorebridge_predictions_total", "Total recognition requests"),
        &["result"],
    )
    .unwrap()
});

/// Prediction duration in seconds.
pub static PREDICTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scorebridge_prediction_duration_seconds",
            "Duration of a recognition request",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ARTIFACT_DOWNLOADS.clone()),
        Box::new(ARTIFACT_BYTES.clone()),
        Box::new(PREDICTIONS_TOTAL.clone()),
        Box::new(PREDICTION_DURATION.clone()),
    ]
}
