//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, target
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_target_health` (gauge): 1=alive, 0=dead
//! - `proxy_targets_total` / `proxy_targets_alive` (gauges): pool shape

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, target: &str, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "target" => target.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string(),
        "target" => target.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the probe result for one target.
pub fn record_target_health(target: &str, alive: bool) {
    metrics::gauge!("proxy_target_health", "target" => target.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

/// Record the pool shape.
pub fn record_pool_size(total: usize, alive: usize) {
    metrics::gauge!("proxy_targets_total").set(total as f64);
    metrics::gauge!("proxy_targets_alive").set(alive as f64);
}
