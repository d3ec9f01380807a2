//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_state` (gauge): 0=closed, 1=open, 2=half-open, per breaker
//! - `breaker_transitions_total` (counter): state changes by from/to
//! - `breaker_failures_total` (counter): failed guarded operations
//! - `breaker_rejections_total` (counter): calls refused while open
//! - `batch_commits_total` (counter): committed batches by outcome
//! - `batch_setter_calls_total` (counter): setter invocations by state kind
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::batching::StateKind;
use crate::resilience::CircuitState;

/// Install the Prometheus exporter with an HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    metrics::gauge!("breaker_state", "breaker" => breaker.to_string()).set(state.code() as f64);
}

pub fn record_breaker_transition(breaker: &str, from: CircuitState, to: CircuitState) {
    metrics::counter!(
        "breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(breaker, to);
}

pub fn record_breaker_failure(breaker: &str) {
    metrics::counter!("breaker_failures_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_breaker_rejection(breaker: &str) {
    metrics::counter!("breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_batch(outcome: &'static str) {
    metrics::counter!("batch_commits_total", "outcome" => outcome).increment(1);
}

pub fn record_setter_call(kind: StateKind) {
    metrics::counter!("batch_setter_calls_total", "kind" => kind.as_str()).increment(1);
}
