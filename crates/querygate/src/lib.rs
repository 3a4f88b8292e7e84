//! Query service over an analytic database
//!
//! Connections are acquired per operation and released on every exit path.
//! Driver faults are classified into transient connectivity trouble, query
//! defects or unknown failures, and rendered consistently at the HTTP
//! boundary. A health probe exercises the same path on demand.

pub mod catalog;
mod classify;
pub mod config;
mod constants;
pub mod driver;
mod error;
pub mod executor;
mod fault;
pub mod health;
pub mod observability;
pub mod provider;
pub mod responder;
pub mod transport;

pub use catalog::{TableCatalog, TableInfo, TableRepository};
pub use classify::{
    Classification, TRANSIENT_MESSAGE_HINTS, TRANSIENT_SQLSTATES, classify, is_transient_code,
    is_transient_message,
};
pub use config::{Config, ConfigBuilder, ErrorsConfig, HttpConfig, TelemetryConfig};
pub use driver::{Driver, DriverConnection, HanaDriver, Row};
pub use error::{Error, Result};
pub use executor::QueryExecutor;
pub use fault::{Fault, FaultKind};
pub use health::{HealthProbe, HealthReport, HealthResponse, HealthStatus};
pub use provider::{ConnectionHandle, ConnectionProvider};
pub use responder::{ApiError, ErrorResponder, ErrorResponse, error_boundary};
pub use transport::{AppState, router, run_http};
