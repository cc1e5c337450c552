//! Metrics collection and exposition.
//!
//! # Metrics
//! - `idempotency_lookups_total` (counter): cache lookups by outcome (hit, miss)
//! - `idempotency_passthrough_total` (counter): requests skipped, by reason
//! - `idempotency_store_errors_total` (counter): failed store operations by op
//! - `idempotency_keys_generated_total` (counter): keys minted by the client tagger
//! - `gateway_requests_total` (counter): forwarded requests by method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Exporter is optional and bound to its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_lookup(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!("idempotency_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_passthrough(reason: &'static str) {
    counter!("idempotency_passthrough_total", "reason" => reason).increment(1);
}

pub fn record_store_error(op: &'static str) {
    counter!("idempotency_store_errors_total", "op" => op).increment(1);
}

pub fn record_key_generated() {
    counter!("idempotency_keys_generated_total").increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}
