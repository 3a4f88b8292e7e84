//! HTTP error boundary
//!
//! Handlers surface faults by returning [`ApiError`]. Its response carries
//! the fault as an [`EscapedFault`] extension; [`error_boundary`] picks it up,
//! classifies it and renders the client-visible [`ErrorResponse`]. No other
//! code decides a fault's status code.
//!
//! | Classification          | Status | `Retry-After`        |
//! |-------------------------|--------|----------------------|
//! | `TransientConnectivity` | 503    | `retry_after_secs`   |
//! | `QueryExecution`        | 500    | none                 |
//! | `Unknown`               | 500    | none                 |

use std::any::Any;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ErrorsConfig;
use crate::constants::SQLSTATE_TIMEOUT_EXPIRED;
use crate::{Classification, Fault, classify};

pub const TRANSIENT_MESSAGE: &str =
    "Database service is temporarily unavailable. Please try again later.";
pub const QUERY_MESSAGE: &str = "An error occurred while processing the database query.";
pub const UNKNOWN_MESSAGE: &str = "An unexpected error occurred";

/// Body sent for every fault that reaches the boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    pub path: String,
}

/// Status, message and retry hint for one classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultOutcome {
    pub status: StatusCode,
    pub message: &'static str,
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorResponder {
    retry_after_secs: u64,
    expose_fault_details: bool,
}

impl Default for ErrorResponder {
    fn default() -> Self {
        Self::new(ErrorsConfig::default())
    }
}

impl ErrorResponder {
    #[must_use]
    pub const fn new(config: ErrorsConfig) -> Self {
        Self {
            retry_after_secs: config.retry_after_secs,
            expose_fault_details: config.expose_fault_details,
        }
    }

    #[must_use]
    pub const fn outcome(&self, classification: Classification) -> FaultOutcome {
        match classification {
            Classification::TransientConnectivity => FaultOutcome {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: TRANSIENT_MESSAGE,
                retry_after_secs: Some(self.retry_after_secs),
            },
            Classification::QueryExecution => FaultOutcome {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: QUERY_MESSAGE,
                retry_after_secs: None,
            },
            Classification::Unknown => FaultOutcome {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: UNKNOWN_MESSAGE,
                retry_after_secs: None,
            },
        }
    }

    #[must_use]
    pub fn error_response(
        &self,
        fault: &Fault,
        outcome: &FaultOutcome,
        path: &str,
    ) -> ErrorResponse {
        let details = if self.expose_fault_details {
            fault.message().to_string()
        } else {
            outcome.message.to_string()
        };

        ErrorResponse {
            status_code: outcome.status.as_u16(),
            message: outcome.message.to_string(),
            details,
            timestamp: Utc::now(),
            path: path.to_string(),
        }
    }

    /// Classify, log and render a fault that escaped a handler
    pub fn respond(&self, fault: &Fault, path: &str) -> Response {
        let classification = classify(fault);
        let outcome = self.outcome(classification);
        let status = outcome.status.as_u16();

        if classification.is_transient() {
            tracing::warn!(
                path,
                %classification,
                status,
                code = ?fault.driver_code(),
                error = %fault,
                "Transient database fault"
            );
        } else {
            tracing::error!(
                path,
                %classification,
                status,
                code = ?fault.driver_code(),
                kind = %fault.kind(),
                error = %fault,
                "Request failed"
            );
        }

        #[cfg(feature = "metrics")]
        crate::observability::record_fault(classification.as_str(), status);

        let body = self.error_response(fault, &outcome, path);
        let mut response = (outcome.status, Json(body)).into_response();
        if let Some(secs) = outcome.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Fault attached to a handler response, consumed by [`error_boundary`]
#[derive(Debug, Clone)]
pub struct EscapedFault(pub Arc<Fault>);

/// Handler error type.
///
/// Renders as a bare 500 on its own; the body and final status are written
/// by [`error_boundary`].
#[derive(Debug)]
pub struct ApiError(pub Fault);

impl From<Fault> for ApiError {
    fn from(fault: Fault) -> Self {
        Self(fault)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(EscapedFault(Arc::new(self.0)));
        response
    }
}

/// Middleware rendering every [`EscapedFault`] with the request path.
///
/// A bare `408` from the request timeout layer below it is rendered as a
/// statement timeout, so deadline expiry gets the same payload and
/// classification as any other fault.
pub async fn error_boundary(
    State(responder): State<Arc<ErrorResponder>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    match response.extensions_mut().remove::<EscapedFault>() {
        Some(EscapedFault(fault)) => responder.respond(&fault, &path),
        None if response.status() == StatusCode::REQUEST_TIMEOUT => {
            responder.respond(&request_timeout_fault(), &path)
        }
        None => response,
    }
}

fn request_timeout_fault() -> Fault {
    Fault::wrap(
        "Request did not complete before the request timeout",
        Fault::driver("Request timeout expired").with_code(SQLSTATE_TIMEOUT_EXPIRED),
    )
}

/// `CatchPanicLayer` handler: turn a handler panic into an internal fault
#[allow(clippy::needless_pass_by_value)]
pub fn panic_to_fault(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    ApiError(Fault::internal(format!("Request handler panicked: {detail}"))).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::routing::get;
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;
    use tower_http::timeout::TimeoutLayer;

    use super::*;

    fn transient() -> Fault {
        Fault::wrap(
            "Unable to connect to database: Unable to connect to host",
            Fault::driver("Unable to connect to host").with_code("08001"),
        )
    }

    fn malformed() -> Fault {
        Fault::wrap(
            "Query execution failed: sql syntax error",
            Fault::driver("sql syntax error").with_code("42000"),
        )
    }

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_outcome_table() {
        let responder = ErrorResponder::default();

        let outcome = responder.outcome(Classification::TransientConnectivity);
        assert_eq!(outcome.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(outcome.retry_after_secs, Some(30));
        assert_eq!(outcome.message, TRANSIENT_MESSAGE);

        let outcome = responder.outcome(Classification::QueryExecution);
        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(outcome.retry_after_secs.is_none());
        assert_eq!(outcome.message, QUERY_MESSAGE);

        let outcome = responder.outcome(Classification::Unknown);
        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(outcome.retry_after_secs.is_none());
        assert_eq!(outcome.message, UNKNOWN_MESSAGE);
    }

    #[test]
    fn test_configured_retry_after() {
        let responder = ErrorResponder::new(ErrorsConfig {
            retry_after_secs: 5,
            expose_fault_details: true,
        });
        let outcome = responder.outcome(Classification::TransientConnectivity);
        assert_eq!(outcome.retry_after_secs, Some(5));
    }

    #[tokio::test]
    async fn test_respond_transient() {
        let response = ErrorResponder::default().respond(&transient(), "/api/tables");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");

        let body = body_of(response).await;
        assert_eq!(body.status_code, 503);
        assert_eq!(body.message, TRANSIENT_MESSAGE);
        assert!(body.details.starts_with("Unable to connect to database"));
        assert_eq!(body.path, "/api/tables");
    }

    #[tokio::test]
    async fn test_respond_query_execution() {
        let response = ErrorResponder::default().respond(&malformed(), "/api/tables");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        assert_eq!(body_of(response).await.message, QUERY_MESSAGE);
    }

    #[tokio::test]
    async fn test_hidden_details_repeat_message() {
        let responder = ErrorResponder::new(ErrorsConfig {
            retry_after_secs: 30,
            expose_fault_details: false,
        });
        let body = body_of(responder.respond(&malformed(), "/x")).await;
        assert_eq!(body.details, QUERY_MESSAGE);
        assert!(!body.details.contains("syntax"));
    }

    #[test]
    fn test_error_response_camel_case() {
        let responder = ErrorResponder::default();
        let outcome = responder.outcome(Classification::Unknown);
        let body = responder.error_response(&Fault::internal("boom"), &outcome, "/p");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["details"], "boom");
        assert_eq!(json["path"], "/p");
        assert!(json["timestamp"].is_string());
    }

    fn app() -> Router {
        async fn fails() -> Result<&'static str, ApiError> {
            Err(Fault::driver("Network is unreachable").into())
        }
        async fn ok() -> Result<&'static str, ApiError> {
            Ok("fine")
        }
        async fn panics() -> &'static str {
            panic!("handler bug")
        }
        async fn stalls() -> &'static str {
            std::future::pending().await
        }

        Router::new()
            .route("/fails", get(fails))
            .route("/ok", get(ok))
            .route("/panics", get(panics))
            .route("/stalls", get(stalls))
            .layer(CatchPanicLayer::custom(panic_to_fault))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(5),
            ))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(ErrorResponder::default()),
                error_boundary,
            ))
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_boundary_renders_escaped_fault() {
        let response = app().oneshot(get_request("/fails")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<EscapedFault>().is_none());
        let body = body_of(response).await;
        assert_eq!(body.path, "/fails");
        assert_eq!(body.details, "Network is unreachable");
    }

    #[tokio::test]
    async fn test_boundary_passes_success_through() {
        let response = app().oneshot(get_request("/ok")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"fine");
    }

    #[tokio::test]
    async fn test_boundary_renders_panic_as_unknown() {
        let response = app().oneshot(get_request("/panics")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body.message, UNKNOWN_MESSAGE);
        assert!(body.details.contains("handler bug"));
        assert_eq!(body.path, "/panics");
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_renders_request_timeout_as_transient() {
        let response = app().oneshot(get_request("/stalls")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
        let body = body_of(response).await;
        assert_eq!(body.status_code, 503);
        assert_eq!(body.message, TRANSIENT_MESSAGE);
        assert_eq!(body.path, "/stalls");
    }

    #[test]
    fn test_request_timeout_fault_classification() {
        let fault = request_timeout_fault();
        assert_eq!(fault.driver_code(), Some(SQLSTATE_TIMEOUT_EXPIRED));
        assert_eq!(classify(&fault), Classification::TransientConnectivity);
    }

    #[test]
    fn test_panic_payload_variants() {
        let response = panic_to_fault(Box::new(String::from("owned")));
        let fault = &response.extensions().get::<EscapedFault>().unwrap().0;
        assert!(fault.message().contains("owned"));

        let response = panic_to_fault(Box::new(42_u8));
        let fault = &response.extensions().get::<EscapedFault>().unwrap().0;
        assert!(fault.message().contains("unknown panic payload"));
    }
}
