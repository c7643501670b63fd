//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_client_refresh_total` (counter): registry refreshes by outcome
//! - `config_client_fetch_retries_total` (counter): failed fetch attempts by path
//! - `config_client_notifications_total` (counter): bus messages by channel, outcome
//! - `config_client_keys` (gauge): number of cells in the registry
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality (paths and channel names are fixed)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub fn record_refresh(outcome: &'static str) {
    ::metrics::counter!("config_client_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_fetch_retry(path: &str) {
    ::metrics::counter!("config_client_fetch_retries_total", "path" => path.to_string())
        .increment(1);
}

pub fn record_notification(channel: &'static str, outcome: &'static str) {
    ::metrics::counter!(
        "config_client_notifications_total",
        "channel" => channel,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_config_keys(count: usize) {
    ::metrics::gauge!("config_client_keys").set(count as f64);
}

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}
