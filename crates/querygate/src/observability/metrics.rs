//! Prometheus metrics for querygate

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

// Service metrics
const METRIC_UPTIME: &str = "querygate_uptime_seconds";
const METRIC_INFO: &str = "querygate_info";

// Connection lifecycle
const METRIC_CONNECTIONS_OPENED: &str = "querygate_connections_opened_total";
const METRIC_CONNECTIONS_CLOSED: &str = "querygate_connections_closed_total";

// Statements
const METRIC_QUERY_DURATION: &str = "querygate_query_duration_seconds";
const METRIC_QUERY_TOTAL: &str = "querygate_queries_total";

// Boundary and health
const METRIC_FAULTS: &str = "querygate_faults_total";
const METRIC_HEALTH_CHECKS: &str = "querygate_health_checks_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Service uptime in seconds");
    describe_gauge!(METRIC_INFO, "Service information (always 1)");

    describe_counter!(METRIC_CONNECTIONS_OPENED, "Database connections opened");
    describe_counter!(METRIC_CONNECTIONS_CLOSED, "Database connections released");

    describe_histogram!(
        METRIC_QUERY_DURATION,
        "Statement execution duration in seconds"
    );
    describe_counter!(METRIC_QUERY_TOTAL, "Statements executed by outcome");

    describe_counter!(METRIC_FAULTS, "Faults rendered at the HTTP boundary");
    describe_counter!(METRIC_HEALTH_CHECKS, "Health probe outcomes");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

pub fn record_connection_opened() {
    counter!(METRIC_CONNECTIONS_OPENED).increment(1);
}

pub fn record_connection_closed() {
    counter!(METRIC_CONNECTIONS_CLOSED).increment(1);
}

/// Record one statement execution.
pub fn record_query(operation: &str, duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    histogram!(
        METRIC_QUERY_DURATION,
        "operation" => operation.to_owned(),
    )
    .record(duration.as_secs_f64());

    counter!(
        METRIC_QUERY_TOTAL,
        "operation" => operation.to_owned(),
        "status" => status,
    )
    .increment(1);
}

/// Record a fault rendered by the error boundary.
pub fn record_fault(classification: &str, status: u16) {
    counter!(
        METRIC_FAULTS,
        "classification" => classification.to_owned(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record a health probe outcome.
pub fn record_health_check(status: &str) {
    counter!(METRIC_HEALTH_CHECKS, "status" => status.to_owned()).increment(1);
}
