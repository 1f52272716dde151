//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relayed requests by outcome class
//! - `relay_request_duration_seconds` (histogram): relay latency by outcome
//! - `admission_backoff_total` (counter): saturation back-offs applied
//! - `admission_slots_held` (gauge): currently held admission slots

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own address.
///
/// Failure to bind the exporter is logged, not fatal: the relay itself keeps
/// serving without metrics exposition.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record one finished relay request.
pub fn record_relay(outcome: &'static str, start: Instant) {
    metrics::counter!("relay_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("relay_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one admission back-off.
pub fn record_backoff() {
    metrics::counter!("admission_backoff_total").increment(1);
}

/// Track a held admission slot.
pub fn record_slot_acquired() {
    metrics::gauge!("admission_slots_held").increment(1.0);
}

/// Release a held admission slot.
pub fn record_slot_released() {
    metrics::gauge!("admission_slots_held").decrement(1.0);
}
