//! Prometheus metrics for inference and market latency.
//!
//! This module provides metrics for:
//! - Model inference latency and artifact loads
//! - Market provider fetch latency
//! - EV computations and unmatched markets
//! - Malformed market records skipped by the parser

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Inference latency metric name.
pub const METRIC_INFERENCE_LATENCY: &str = "inference_latency_ms";
/// Market fetch latency metric name.
pub const METRIC_MARKET_FETCH_LATENCY: &str = "market_fetch_latency_ms";
/// Model artifact loads counter metric name.
pub const METRIC_MODEL_LOADS: &str = "model_loads_total";
/// EV computations counter metric name.
pub const METRIC_EV_COMPUTATIONS: &str = "ev_computations_total";
/// Skipped market records counter metric name.
pub const METRIC_MARKETS_SKIPPED: &str = "markets_skipped_total";
/// Unmatched events counter metric name.
pub const METRIC_MARKETS_UNMATCHED: &str = "markets_unmatched_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_INFERENCE_LATENCY,
        "Single-state win probability inference latency in milliseconds"
    );
    describe_histogram!(
        METRIC_MARKET_FETCH_LATENCY,
        "Market provider event fetch latency in milliseconds"
    );

    describe_counter!(
        METRIC_MODEL_LOADS,
        "Total number of model artifacts loaded from disk"
    );
    describe_counter!(
        METRIC_EV_COMPUTATIONS,
        "Total number of EV results produced"
    );
    describe_counter!(
        METRIC_MARKETS_SKIPPED,
        "Total number of malformed market records skipped"
    );
    describe_counter!(
        METRIC_MARKETS_UNMATCHED,
        "Total number of events with no full-game moneyline match"
    );

    debug!("Metrics initialized");
}

/// Install the global Prometheus recorder and return its render handle.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Record inference latency.
pub fn record_inference_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_INFERENCE_LATENCY).record(latency_ms);
}

/// Increment model loads counter.
pub fn inc_model_loads() {
    counter!(METRIC_MODEL_LOADS).increment(1);
}

/// Increment EV computations counter, labelled by side.
pub fn inc_ev_computations(side: &str) {
    counter!(METRIC_EV_COMPUTATIONS, "side" => side.to_string()).increment(1);
}

/// Increment skipped market records counter.
pub fn inc_markets_skipped() {
    counter!(METRIC_MARKETS_SKIPPED).increment(1);
}

/// Increment unmatched events counter.
pub fn inc_markets_unmatched() {
    counter!(METRIC_MARKETS_UNMATCHED).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for a market fetch.
pub fn timer_market_fetch() -> LatencyTimer {
    LatencyTimer::new(METRIC_MARKET_FETCH_LATENCY)
}
