//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_calls_total` (counter): admitted calls by circuit, outcome
//! - `breaker_rejected_total` (counter): calls refused by an open circuit
//! - `breaker_call_duration_seconds` (histogram): latency of admitted calls
//! - `breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `breaker_retries_total` (counter): retry attempts scheduled
//! - `breaker_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until a recorder is installed, so library users who
//! never call [`init_metrics`] pay only for the facade lookups.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::resilience::circuit::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(circuit: &str, outcome: &'static str, latency: Duration) {
    counter!("breaker_calls_total", "circuit" => circuit.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("breaker_call_duration_seconds", "circuit" => circuit.to_string())
        .record(latency.as_secs_f64());
}

pub fn record_rejected(circuit: &str) {
    counter!("breaker_rejected_total", "circuit" => circuit.to_string()).increment(1);
}

pub fn record_state(circuit: &str, state: CircuitState) {
    gauge!("breaker_state", "circuit" => circuit.to_string()).set(state.as_gauge());
}

pub fn record_retry(circuit: &str) {
    counter!("breaker_retries_total", "circuit" => circuit.to_string()).increment(1);
}

pub fn record_health(circuit: &str, healthy: bool) {
    gauge!("breaker_health", "circuit" => circuit.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
