//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): relayed requests by method, status
//! - `proxy_request_duration_seconds` (histogram): relay latency
//! - `proxy_interceptor_failures_total` (counter): interceptor errors by name, stage
//! - `proxy_passport_calls_total` (counter): passport service calls by operation, outcome
//! - `proxy_backend_state` (gauge): 0=unstarted, 1=starting, 2=ready, 3=stopped

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::backend::BackendState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Failure is logged; the proxy keeps running without an exporter.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one relayed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];

    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_interceptor_failure(interceptor: &'static str, stage: &'static str) {
    counter!(
        "proxy_interceptor_failures_total",
        "interceptor" => interceptor,
        "stage" => stage
    )
    .increment(1);
}

/// Record a passport service call; `outcome` is "ok", "cancelled" or an error kind.
pub fn record_passport_call(operation: &'static str, outcome: &'static str) {
    counter!(
        "proxy_passport_calls_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn set_backend_state(state: BackendState) {
    gauge!("proxy_backend_state").set(state as u8 as f64);
}
