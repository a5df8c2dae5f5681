//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by outcome and status
//! - `dispatch_request_duration_seconds` (histogram): latency distribution
//! - `sessions_live` (gauge): sessions currently in the store
//! - `session_checkpoints_total` (counter): checkpoints by result
//! - `session_checkpoint_duration_seconds` (histogram): checkpoint latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests need none)
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a dispatched request.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "dispatch_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("dispatch_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_live_sessions(count: usize) {
    gauge!("sessions_live").set(count as f64);
}

pub fn record_checkpoint(success: bool, start: Instant) {
    let result = if success { "ok" } else { "error" };
    counter!("session_checkpoints_total", "result" => result).increment(1);
    histogram!("session_checkpoint_duration_seconds").record(start.elapsed().as_secs_f64());
}
