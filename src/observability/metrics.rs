//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): responses by method and status
//! - `proxy_cache_hits_total` / `proxy_cache_misses_total` (counters)
//! - `proxy_cache_skips_total` (counter): fetches too large to cache
//! - `proxy_origin_fetches_total` (counter): outbound fetches by status
//! - `proxy_cache_entries` (gauge): current cache population

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Failure to install is logged
/// and otherwise ignored; the proxy keeps serving without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed client request.
pub fn record_request(method: &str, status: u16) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_cache_hit() {
    counter!("proxy_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("proxy_cache_misses_total").increment(1);
}

/// A response was relayed but skipped the cache (over the size ceiling).
pub fn record_cache_skip() {
    counter!("proxy_cache_skips_total").increment(1);
}

pub fn record_origin_fetch(status: u16) {
    counter!("proxy_origin_fetches_total", "status" => status.to_string()).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("proxy_cache_entries").set(entries as f64);
}
