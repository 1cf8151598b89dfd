//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_admissions_total` (counter): admission outcomes by `outcome`
//! - `gate_budget_rollbacks_total` (counter): reservations refunded
//! - `breaker_transitions_total` (counter): state changes by `dependency`, `to`
//! - `breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `breaker_rejections_total` (counter): calls refused while open
//!
//! Tenant keys are deliberately not used as labels (unbounded cardinality).

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

/// Record the outcome of one admission attempt.
pub fn record_admission(outcome: &'static str) {
    counter!("gate_admissions_total", "outcome" => outcome).increment(1);
}

/// Record a budget rollback.
pub fn record_rollback(reason: &'static str) {
    counter!("gate_budget_rollbacks_total", "reason" => reason).increment(1);
}

/// Record a breaker state change.
pub fn record_breaker_transition(dependency: &str, to: CircuitState) {
    counter!(
        "breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(dependency, to);
}

/// Set the current state gauge of a breaker.
pub fn record_breaker_state(dependency: &str, state: CircuitState) {
    gauge!("breaker_state", "dependency" => dependency.to_string()).set(state.gauge_value());
}

/// Record a call refused by an open breaker.
pub fn record_breaker_rejection(dependency: &str) {
    counter!("breaker_rejections_total", "dependency" => dependency.to_string()).increment(1);
}
