//! Metrics definitions for the referee lights service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `lights_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `stage`: 2 values (broadcast, outbound)
//! - `kind`: 2 values (platform_ready, next_attempt)
//! - `error_type`: bounded by `LightsError::error_type()` (~10 values)
//!
//! Meet names are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle
/// used to serve `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // A round takes seconds to tens of seconds while referees decide
        .set_buckets_for_metric(
            Matcher::Prefix("lights_decision_latency".to_string()),
            &[0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0],
        )
        .map_err(|e| format!("Failed to set decision latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Gauges
// ============================================================================

/// Set the number of live WebSocket connections.
///
/// Metric: `lights_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("lights_connections_active").set(count as f64);
}

/// Set the number of meets with live state.
///
/// Metric: `lights_meets_active`
pub fn set_meets_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("lights_meets_active").set(count as f64);
}

/// Set the depth of the broadcast distribution queue.
///
/// Metric: `lights_broadcast_queue_depth`
pub fn set_broadcast_queue_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("lights_broadcast_queue_depth").set(depth as f64);
}

// ============================================================================
// Histograms
// ============================================================================

/// Record the time from the first decision of a round to quorum.
///
/// Metric: `lights_decision_latency_seconds`
pub fn record_decision_latency(duration: Duration) {
    histogram!("lights_decision_latency_seconds").record(duration.as_secs_f64());
}

// ============================================================================
// Counters
// ============================================================================

/// Record a message dropped because a bounded queue was full.
///
/// Metric: `lights_messages_dropped_total`
/// Labels: `stage` (broadcast, outbound)
pub fn record_message_dropped(stage: &'static str) {
    counter!("lights_messages_dropped_total", "stage" => stage).increment(1);
}

/// Record a completed round.
///
/// Metric: `lights_rounds_completed_total`
pub fn record_round_completed() {
    counter!("lights_rounds_completed_total").increment(1);
}

/// Record a timer start.
///
/// Metric: `lights_timers_started_total`
/// Labels: `kind` (platform_ready, next_attempt)
pub fn record_timer_started(kind: &'static str) {
    counter!("lights_timers_started_total", "kind" => kind).increment(1);
}

/// Record an inbound message discarded by validation or policy.
///
/// Metric: `lights_protocol_errors_total`
/// Labels: `error_type`
pub fn record_protocol_error(error_type: &'static str) {
    counter!("lights_protocol_errors_total", "error_type" => error_type).increment(1);
}
