//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_calls_total` (counter): calls by service, outcome
//! - `resilience_call_duration_seconds` (histogram): end-to-end latency incl. queueing
//! - `resilience_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `resilience_circuit_transitions_total` (counter): transitions by target state
//! - `resilience_bulkhead_in_flight` / `resilience_bulkhead_queued` (gauges)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and installed once at startup

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::bulkhead::Tier;
use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record the outcome of one managed call.
pub fn record_call(service: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "resilience_calls_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("resilience_call_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record a breaker state change.
pub fn record_circuit_state(service: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    gauge!("resilience_circuit_state", "service" => service.to_string()).set(value);
    counter!(
        "resilience_circuit_transitions_total",
        "service" => service.to_string(),
        "to" => state.as_str()
    )
    .increment(1);
}

/// Record current bulkhead occupancy.
pub fn record_bulkhead_occupancy(service: &str, tier: Tier, running: usize, queued: usize) {
    gauge!(
        "resilience_bulkhead_in_flight",
        "service" => service.to_string(),
        "tier" => tier.as_str()
    )
    .set(running as f64);
    gauge!(
        "resilience_bulkhead_queued",
        "service" => service.to_string(),
        "tier" => tier.as_str()
    )
    .set(queued as f64);
}
