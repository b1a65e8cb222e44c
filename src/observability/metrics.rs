//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, outcome, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_route_misses_total` (counter): requests no route matched
//! - `gateway_upstream_clients` (gauge): clients held by the registry
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a forwarded request.
pub fn record_request(route: &str, outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_route_miss() {
    metrics::counter!("gateway_route_misses_total").increment(1);
}

pub fn record_upstream_clients(count: usize) {
    metrics::gauge!("gateway_upstream_clients").set(count as f64);
}
