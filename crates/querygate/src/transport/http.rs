//! HTTP routes and server loop

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::{Router, middleware};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::Error;
use crate::catalog::{TableInfo, TableRepository};
use crate::config::HttpConfig;
use crate::constants::{
    SLOW_DEFAULT_DELAY_SECS, SLOW_MAX_DELAY_SECS, SLOW_MIN_DELAY_SECS,
    STATUS_CLIENT_CLOSED_REQUEST,
};
use crate::health::{HealthProbe, HealthResponse, HealthStatus};
use crate::responder::{ApiError, ErrorResponder, error_boundary, panic_to_fault};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub tables: Arc<dyn TableRepository>,
    pub health: Arc<HealthProbe>,
    /// Cancelled when the server starts shutting down
    pub shutdown: CancellationToken,
}

/// `GET /api/tables` body
#[derive(Debug, Serialize, Deserialize)]
pub struct TableList {
    pub items: Vec<TableInfo>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlowParams {
    delay_seconds: Option<u64>,
}

/// `GET /api/slow` body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowResponse {
    pub message: String,
    pub delay_seconds: u64,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Build the service router.
///
/// Layer order, outermost first: tracing, error boundary, request timeout,
/// panic catcher. Panics and expired deadlines therefore reach the boundary
/// and are rendered as faults.
pub fn router(state: AppState, responder: ErrorResponder, request_timeout: Duration) -> Router {
    #[allow(unused_mut)]
    let mut app = Router::new()
        .route("/api/tables", get(list_tables_handler))
        .route("/api/slow", get(slow_handler))
        .route("/health", get(health_handler));

    #[cfg(feature = "metrics")]
    {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.with_state(state)
        .layer(CatchPanicLayer::custom(panic_to_fault))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::new(responder),
            error_boundary,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests
pub async fn run_http(
    state: AppState,
    responder: ErrorResponder,
    config: &HttpConfig,
) -> crate::Result<()> {
    let addr = config.socket_addr();
    emit_security_warnings(config.host);

    let shutdown = state.shutdown.clone();
    let app = router(state, responder, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn emit_security_warnings(host: IpAddr) {
    if host == IpAddr::V4(Ipv4Addr::UNSPECIFIED) || host == IpAddr::V6(Ipv6Addr::UNSPECIFIED) {
        tracing::warn!(
            "HTTP server binding to all interfaces. \
             The service has no authentication; restrict access at the network level."
        );
    } else if !host.is_loopback() {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({host}). \
             Ensure network security policies are in place."
        );
    }
}

async fn list_tables_handler(State(state): State<AppState>) -> Result<Json<TableList>, ApiError> {
    tracing::info!("Retrieving tables");

    // Client disconnects drop this future, which releases the connection
    let items = state.tables.list_tables(&CancellationToken::new()).await?;
    let count = items.len();

    tracing::info!(count, "Retrieved tables");
    Ok(Json(TableList {
        items,
        count,
        timestamp: Utc::now(),
    }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let report = state.health.check(&CancellationToken::new()).await;
    let body = HealthResponse::new(&report, start.elapsed());

    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(body))
}

/// Sleeps to exercise graceful shutdown; abandons the wait when the server stops
async fn slow_handler(
    State(state): State<AppState>,
    Query(params): Query<SlowParams>,
) -> Response {
    let delay = clamp_delay(params.delay_seconds);
    let start = tokio::time::Instant::now();
    tracing::info!(delay_seconds = delay, "/api/slow started");

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(delay)) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::info!(elapsed_ms, "/api/slow completed");
            Json(SlowResponse {
                message: "Completed slow operation".to_string(),
                delay_seconds: delay,
                elapsed_ms,
                timestamp: Utc::now(),
            })
            .into_response()
        }
        () = state.shutdown.cancelled() => {
            tracing::warn!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "/api/slow cancelled"
            );
            StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
                .into_response()
        }
    }
}

fn clamp_delay(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(SLOW_DEFAULT_DELAY_SECS)
        .clamp(SLOW_MIN_DELAY_SECS, SLOW_MAX_DELAY_SECS)
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}
