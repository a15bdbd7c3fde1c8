//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_config_tests_total` (counter): proxy config tests by result
//! - `gateway_reloads_total` (counter): reloads issued
//! - `gateway_quarantined_files` (gauge): `.err` files found by the last sweep
//! - `gateway_connection_resets_total` (counter): resets by result
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs a recorder
//! - The Prometheus endpoint is optional and off by default

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(%addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(%addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_config_test(passed: bool) {
    let result = if passed { "pass" } else { "fail" };
    ::metrics::counter!("gateway_config_tests_total", "result" => result).increment(1);
}

pub fn record_reload() {
    ::metrics::counter!("gateway_reloads_total").increment(1);
}

pub fn record_quarantined_files(count: usize) {
    ::metrics::gauge!("gateway_quarantined_files").set(count as f64);
}

pub fn record_connection_reset(succeeded: bool) {
    let result = if succeeded { "ok" } else { "failed" };
    ::metrics::counter!("gateway_connection_resets_total", "result" => result).increment(1);
}
