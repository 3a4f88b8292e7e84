//! HTTP transport
//!
//! Routes: `GET /api/tables`, `GET /health`, `GET /api/slow` and, with the
//! `metrics` feature, `GET /metrics`.

mod http;

pub use http::{AppState, SlowResponse, TableList, router, run_http};
