//! Database health probe
//!
//! Each check opens one connection, runs the driver's probe statement and
//! releases the connection. The status depends only on that single attempt.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::Fault;
use crate::constants::{HEALTH_CHECK_NAME, PROBE_EXPECTED_VALUE};
use crate::executor::QueryExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Degraded => "Degraded",
            Self::Unhealthy => "Unhealthy",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Healthy => "database is healthy",
            Self::Degraded => "database returned unexpected result",
            Self::Unhealthy => "database is unavailable",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe invocation
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub description: String,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    /// Set only for `Unhealthy`
    pub fault: Option<Fault>,
}

#[derive(Debug, Clone)]
pub struct HealthProbe {
    executor: QueryExecutor,
}

impl HealthProbe {
    #[must_use]
    pub const fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Run the probe once. Never fails; faults become `Unhealthy`.
    pub async fn check(&self, cancel: &CancellationToken) -> HealthReport {
        let start = Instant::now();
        let statement = self.executor.provider().driver().probe_statement();
        let result = self.executor.scalar::<Value>(statement, &[], cancel).await;
        let duration = start.elapsed();

        let (status, fault) = match result {
            Ok(value) if is_expected(&value) => {
                tracing::debug!(elapsed_ms = duration.as_millis() as u64, "Health probe passed");
                (HealthStatus::Healthy, None)
            }
            Ok(value) => {
                tracing::warn!(
                    %value,
                    expected = PROBE_EXPECTED_VALUE,
                    "Health probe returned unexpected result"
                );
                (HealthStatus::Degraded, None)
            }
            Err(fault) => {
                tracing::error!(
                    error = %fault,
                    code = ?fault.driver_code(),
                    "Health probe failed"
                );
                (HealthStatus::Unhealthy, Some(fault))
            }
        };

        #[cfg(feature = "metrics")]
        crate::observability::record_health_check(status.as_str());

        HealthReport {
            status,
            description: status.description().to_string(),
            duration,
            timestamp: Utc::now(),
            fault,
        }
    }
}

// Engines differ in how they type a literal: integer, float or decimal text
fn is_expected(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.as_i64() == Some(PROBE_EXPECTED_VALUE)
                || n.as_f64() == Some(PROBE_EXPECTED_VALUE as f64)
        }
        Value::String(s) => s.trim().parse::<f64>().ok() == Some(PROBE_EXPECTED_VALUE as f64),
        _ => false,
    }
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheckEntry>,
    /// Milliseconds
    pub total_duration: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckEntry {
    pub name: String,
    pub status: HealthStatus,
    pub description: String,
    /// Milliseconds
    pub duration: u64,
}

impl HealthResponse {
    #[must_use]
    pub fn new(report: &HealthReport, total: Duration) -> Self {
        Self {
            status: report.status,
            checks: vec![HealthCheckEntry {
                name: HEALTH_CHECK_NAME.to_string(),
                status: report.status,
                description: report.description.clone(),
                duration: report.duration.as_millis() as u64,
            }],
            total_duration: total.as_millis() as u64,
            timestamp: report.timestamp,
        }
    }
}
