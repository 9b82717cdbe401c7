//! Prometheus metrics for the dispatcher.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use vdigest_models::CycleReport;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const CYCLES_TOTAL: &str = "vdigest_cycles_total";
    pub const CYCLE_DURATION_SECONDS: &str = "vdigest_cycle_duration_seconds";
    pub const ITEMS_TOTAL: &str = "vdigest_items_total";
    pub const RECOVERED_ITEMS_TOTAL: &str = "vdigest_recovered_items_total";
    pub const SUMMARIZE_DURATION_SECONDS: &str = "vdigest_summarize_duration_seconds";
    pub const QUOTA_USED: &str = "vdigest_quota_used";
    pub const PENDING_ITEMS: &str = "vdigest_pending_items";
}

/// Serve `/metrics` on the given port.
pub fn install_exporter(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("Failed to start metrics exporter: {}", e)))
}

/// Record a finished cycle.
pub fn record_cycle(report: &CycleReport, duration_secs: f64) {
    let labels = [("stopped_reason", report.stopped_reason.as_str().to_string())];
    counter!(names::CYCLES_TOTAL, &labels).increment(1);
    histogram!(names::CYCLE_DURATION_SECONDS).record(duration_secs);

    record_items("completed", report.completed);
    record_items("failed", report.failed);
    record_items("retried", report.retried);
    record_items("skipped_due_to_quota", report.skipped_due_to_quota);
    counter!(names::RECOVERED_ITEMS_TOTAL).increment(u64::from(report.recovered));

    gauge!(names::QUOTA_USED).set(f64::from(report.quota_used));
    gauge!(names::PENDING_ITEMS).set(report.remaining_pending as f64);
}

/// Record a cycle that aborted with an error.
pub fn record_cycle_error() {
    let labels = [("stopped_reason", "error".to_string())];
    counter!(names::CYCLES_TOTAL, &labels).increment(1);
}

/// Record one summarization call.
pub fn record_summarize_duration(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    histogram!(names::SUMMARIZE_DURATION_SECONDS, &labels).record(duration_secs);
}

fn record_items(outcome: &str, count: u32) {
    if count > 0 {
        let labels = [("outcome", outcome.to_string())];
        counter!(names::ITEMS_TOTAL, &labels).increment(u64::from(count));
    }
}
