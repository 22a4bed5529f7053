//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric definitions
//! - Helpers for recording request timings and calendar sync outcomes

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::ApiResult;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded. Returns `false`
/// if a recorder was already installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("worklog_requests_total", "Total number of API requests");
    describe_histogram!(
        "worklog_request_duration_seconds",
        "Duration of API requests in seconds"
    );
    describe_counter!(
        "worklog_calendar_sync_total",
        "Calendar event inserts by outcome"
    );
    describe_histogram!(
        "worklog_calendar_sync_duration_seconds",
        "Duration of calendar event inserts in seconds"
    );
    describe_counter!("worklog_login_failures_total", "Rejected login attempts");
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record a completed API request.
///
/// * `endpoint` - handler name, e.g. "logs_create"
/// * `status` - HTTP status code as string
pub fn record_request(endpoint: &str, status: &str, duration: Duration) {
    counter!("worklog_requests_total", "endpoint" => endpoint.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("worklog_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(duration.as_secs_f64());
}

/// Record one calendar insert. `outcome` is "ok", "error" or "skipped".
pub fn record_calendar_sync(outcome: &str, duration: Duration) {
    counter!("worklog_calendar_sync_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("worklog_calendar_sync_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_login_failure(locked: bool) {
    counter!("worklog_login_failures_total", "locked" => locked.to_string()).increment(1);
}

/// Helper for timing request handlers.
pub struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: Instant::now(),
        }
    }

    pub fn finish(self, status: u16) {
        record_request(self.endpoint, &status.to_string(), self.start.elapsed());
    }
}

/// Run a handler body and record its outcome under `endpoint`.
pub async fn timed<T, F>(endpoint: &'static str, body: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    let timer = RequestTimer::new(endpoint);
    let result = body.await;
    match &result {
        Ok(_) => timer.finish(200),
        Err(e) => timer.finish(e.status_code().as_u16()),
    }
    result
}
