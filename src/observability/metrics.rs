//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): dispatched requests by status
//! - `guard_access_decisions_total` (counter): verdicts by outcome
//! - `guard_csrf_failures_total` (counter): CSRF failures by reason
//! - `guard_active_sessions` (gauge): open sessions
//!
//! # Design Decisions
//! - Uses the `metrics` facade; without an installed recorder every call
//!   is a no-op, so library users and tests pay nothing
//! - Prometheus exporter runs its own HTTP listener

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and start its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(status: u16) {
    metrics::counter!("guard_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_access_decision(outcome: &'static str) {
    metrics::counter!("guard_access_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_csrf_failure(reason: &'static str) {
    metrics::counter!("guard_csrf_failures_total", "reason" => reason).increment(1);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("guard_active_sessions").set(count as f64);
}
