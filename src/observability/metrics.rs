//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (accepts, live connections, durations, failures)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `connhub_connections_accepted_total` (counter)
//! - `connhub_connections_active` (gauge): current connection count
//! - `connhub_connection_duration_seconds` (histogram): connection lifetime
//! - `connhub_accept_errors_total` (counter): by `kind` (transient, fatal)
//! - `connhub_handler_failures_total` (counter): by `kind` (error, panic)
//! - `connhub_hook_panics_total` (counter): `on_connect` hook panics
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_accepted() {
    metrics::counter!("connhub_connections_accepted_total").increment(1);
    metrics::gauge!("connhub_connections_active").increment(1.0);
}

pub fn record_connection_closed(connected_at: Instant) {
    metrics::gauge!("connhub_connections_active").decrement(1.0);
    metrics::histogram!("connhub_connection_duration_seconds")
        .record(connected_at.elapsed().as_secs_f64());
}

pub fn record_accept_error(transient: bool) {
    let kind = if transient { "transient" } else { "fatal" };
    metrics::counter!("connhub_accept_errors_total", "kind" => kind).increment(1);
}

pub fn record_handler_failure(panicked: bool) {
    let kind = if panicked { "panic" } else { "error" };
    metrics::counter!("connhub_handler_failures_total", "kind" => kind).increment(1);
}

pub fn record_hook_panic() {
    metrics::counter!("connhub_hook_panics_total").increment(1);
}
