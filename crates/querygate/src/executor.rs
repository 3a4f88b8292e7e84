//! Statement execution with scoped connections
//!
//! Every operation acquires its own connection through the
//! [`ConnectionProvider`], runs one statement and releases the connection
//! before returning, whatever the outcome. Driver failures are wrapped with
//! the operation's context and returned; nothing is swallowed or retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::Fault;
use crate::driver::Row;
use crate::provider::ConnectionProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Query,
    Execute,
    Scalar,
}

impl Operation {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Execute => "execute",
            Self::Scalar => "scalar",
        }
    }

    const fn failure_prefix(self) -> &'static str {
        match self {
            Self::Query => "Query execution failed",
            Self::Execute => "Command execution failed",
            Self::Scalar => "Scalar query execution failed",
        }
    }
}

enum Outcome {
    Rows(Vec<Row>),
    Affected(u64),
    Value(Value),
}

/// Runs statements on scoped connections with a per-statement timeout
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    provider: Arc<ConnectionProvider>,
    query_timeout: Duration,
}

impl QueryExecutor {
    pub const fn new(provider: Arc<ConnectionProvider>, query_timeout: Duration) -> Self {
        Self {
            provider,
            query_timeout,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Run a row-producing statement and map every row to `T`.
    ///
    /// Rows are deserialized positionally, so `T` is typically a struct
    /// whose fields follow the column order, a tuple, or a single value for
    /// one-column results.
    pub async fn query<T: DeserializeOwned>(
        &self,
        statement: &str,
        params: &[Value],
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, Fault> {
        let Outcome::Rows(rows) = self.run(Operation::Query, statement, params, cancel).await? else {
            return Err(unexpected_outcome(Operation::Query));
        };

        rows.into_iter()
            .enumerate()
            .map(|(index, row)| {
                map_row(row).map_err(|e| {
                    Fault::internal(format!("Failed to map row {index} of query result: {e}"))
                })
            })
            .collect()
    }

    /// Like [`Self::query`] but only the first row, if any
    pub async fn query_first<T: DeserializeOwned>(
        &self,
        statement: &str,
        params: &[Value],
        cancel: &CancellationToken,
    ) -> Result<Option<T>, Fault> {
        let Outcome::Rows(rows) = self.run(Operation::Query, statement, params, cancel).await? else {
            return Err(unexpected_outcome(Operation::Query));
        };

        rows.into_iter()
            .next()
            .map(map_row)
            .transpose()
            .map_err(|e| Fault::internal(format!("Failed to map first row of query result: {e}")))
    }

    /// Run a statement and return the affected row count
    pub async fn execute(
        &self,
        statement: &str,
        params: &[Value],
        cancel: &CancellationToken,
    ) -> Result<u64, Fault> {
        match self.run(Operation::Execute, statement, params, cancel).await? {
            Outcome::Affected(count) => Ok(count),
            _ => Err(unexpected_outcome(Operation::Execute)),
        }
    }

    /// Run a statement and return its single value.
    ///
    /// An empty result reads as `null`; use `Option<T>` to accept it.
    pub async fn scalar<T: DeserializeOwned>(
        &self,
        statement: &str,
        params: &[Value],
        cancel: &CancellationToken,
    ) -> Result<T, Fault> {
        let Outcome::Value(value) = self.run(Operation::Scalar, statement, params, cancel).await?
        else {
            return Err(unexpected_outcome(Operation::Scalar));
        };

        serde_json::from_value(value)
            .map_err(|e| Fault::internal(format!("Failed to map scalar result: {e}")))
    }

    async fn run(
        &self,
        op: Operation,
        statement: &str,
        params: &[Value],
        cancel: &CancellationToken,
    ) -> Result<Outcome, Fault> {
        let mut conn = self.provider.acquire(cancel).await?;
        let connection_id = conn.id();
        let start = Instant::now();

        let work = async {
            match op {
                Operation::Query => conn.query(statement, params).await.map(Outcome::Rows),
                Operation::Execute => conn.execute(statement, params).await.map(Outcome::Affected),
                Operation::Scalar => conn.scalar(statement, params).await.map(Outcome::Value),
            }
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Fault::cancelled(op.as_str())),
            outcome = tokio::time::timeout(self.query_timeout, work) => match outcome {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(fault)) => Err(wrap_failure(op, fault)),
                Err(_) => Err(wrap_failure(op, Fault::statement_timeout(self.query_timeout))),
            },
        };
        conn.release();

        record(op, start, result.is_ok());
        match &result {
            Ok(_) => tracing::debug!(
                operation = op.as_str(),
                connection.id = connection_id,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Statement completed"
            ),
            Err(fault) => tracing::debug!(
                operation = op.as_str(),
                connection.id = connection_id,
                error = %fault,
                "Statement failed"
            ),
        }
        result
    }
}

fn wrap_failure(op: Operation, fault: Fault) -> Fault {
    Fault::wrap(format!("{}: {fault}", op.failure_prefix()), fault)
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record(op: Operation, start: Instant, success: bool) {
    #[cfg(feature = "metrics")]
    crate::observability::record_query(op.as_str(), start.elapsed(), success);
}

fn unexpected_outcome(op: Operation) -> Fault {
    Fault::internal(format!("{} produced an unexpected result shape", op.as_str()))
}

/// Deserialize one positional row. Single-column rows also map to plain values.
fn map_row<T: DeserializeOwned>(mut row: Row) -> Result<T, serde_json::Error> {
    if row.len() == 1 {
        let value = row.pop().unwrap_or(Value::Null);
        return serde_json::from_value(value.clone())
            .or_else(|_| serde_json::from_value(Value::Array(vec![value])));
    }
    serde_json::from_value(Value::Array(row))
}
