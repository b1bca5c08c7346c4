//! Metrics collection and Prometheus export.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Must run once at startup before any metrics are recorded. Later calls are
/// ignored so test binaries can call it from every test.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count stored levels by operation (`put`, `batch`, `delete`).
pub fn record_level_write(operation: &'static str, count: u64) {
    counter!("congestion_levels_written_total", "operation" => operation).increment(count);
}

/// Count `unknown` placeholders served for chargers without a record.
pub fn record_unknown_levels(count: u64) {
    counter!("congestion_unknown_levels_total").increment(count);
}
