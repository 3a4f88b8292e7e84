//! Scripted in-memory driver shared by the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::Request;
use axum::response::Response;
use querygate::{
    AppState, ConnectionProvider, Driver, DriverConnection, ErrorResponder, Fault, HealthProbe,
    QueryExecutor, Row, TableCatalog, router,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Connections opened and released by a [`ScriptedDriver`]
#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl Counters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// What `connect` does
#[derive(Debug, Clone)]
pub enum Connect {
    Open,
    Refuse(Fault),
    Hang,
}

/// What every statement on an opened connection does
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(Fault),
    Hang,
}

pub struct ScriptedDriver {
    connect: Mutex<Connect>,
    reply: Reply,
    pub counters: Arc<Counters>,
}

impl ScriptedDriver {
    pub fn new(connect: Connect, reply: Reply) -> Self {
        Self::with_counters(connect, reply, Arc::new(Counters::default()))
    }

    pub fn with_counters(connect: Connect, reply: Reply, counters: Arc<Counters>) -> Self {
        Self {
            connect: Mutex::new(connect),
            reply,
            counters,
        }
    }

    /// Change what later `connect` calls do
    pub fn set_connect(&self, connect: Connect) {
        *self.connect.lock().unwrap() = connect;
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn connect(&self) -> Result<Box<dyn DriverConnection>, Fault> {
        let connect = self.connect.lock().unwrap().clone();
        match connect {
            Connect::Open => {
                self.counters.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedConnection {
                    reply: self.reply.clone(),
                    counters: Arc::clone(&self.counters),
                }))
            }
            Connect::Refuse(fault) => Err(fault),
            Connect::Hang => std::future::pending().await,
        }
    }
}

struct ScriptedConnection {
    reply: Reply,
    counters: Arc<Counters>,
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedConnection {
    async fn play(&self) -> Result<Reply, Fault> {
        match &self.reply {
            Reply::Fail(fault) => Err(fault.clone()),
            Reply::Hang => std::future::pending().await,
            other => Ok(other.clone()),
        }
    }
}

#[async_trait]
impl DriverConnection for ScriptedConnection {
    async fn query(&mut self, _statement: &str, _params: &[Value]) -> Result<Vec<Row>, Fault> {
        match self.play().await? {
            Reply::Rows(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }

    async fn execute(&mut self, _statement: &str, _params: &[Value]) -> Result<u64, Fault> {
        match self.play().await? {
            Reply::Affected(count) => Ok(count),
            _ => Ok(0),
        }
    }
}

pub fn executor(driver: ScriptedDriver, query_timeout: Duration) -> QueryExecutor {
    shared_executor(Arc::new(driver), query_timeout)
}

/// Executor over a driver the test keeps a handle to
pub fn shared_executor(driver: Arc<ScriptedDriver>, query_timeout: Duration) -> QueryExecutor {
    let provider = ConnectionProvider::new(driver, Duration::from_secs(5));
    QueryExecutor::new(Arc::new(provider), query_timeout)
}

/// Router whose listing and health endpoints both go through `driver`
pub fn app(driver: ScriptedDriver) -> Router {
    app_with_timeouts(driver, Duration::from_secs(5), Duration::from_secs(60))
}

pub fn app_with_timeouts(
    driver: ScriptedDriver,
    query_timeout: Duration,
    request_timeout: Duration,
) -> Router {
    let executor = executor(driver, query_timeout);
    let state = AppState {
        tables: Arc::new(TableCatalog::new(executor.clone())),
        health: Arc::new(HealthProbe::new(executor)),
        shutdown: CancellationToken::new(),
    };
    router(state, ErrorResponder::default(), request_timeout)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn refused() -> Fault {
    Fault::driver("Unable to connect to host").with_code("08001")
}

pub fn malformed() -> Fault {
    Fault::driver("sql syntax error: incorrect syntax near \"FORM\"").with_code("42000")
}
