//! Native driver surface
//!
//! The service depends on nothing from a database driver beyond
//! [`Driver::connect`] and the three statement operations on
//! [`DriverConnection`]. Failures are reported as [`Fault`]s.
//!
//! Dropping a [`DriverConnection`] releases it. Implementations must not
//! rely on an explicit close call, since cancelled operations only ever drop
//! their connection.

mod hana;

use async_trait::async_trait;
use serde_json::Value;

pub use hana::HanaDriver;

use crate::Fault;
use crate::constants::DEFAULT_PROBE_QUERY;

/// One result row, values in column order
pub type Row = Vec<Value>;

/// Factory for database connections
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection to the engine
    async fn connect(&self) -> Result<Box<dyn DriverConnection>, Fault>;

    /// Cheap statement whose single value is the literal `1`
    fn probe_statement(&self) -> &str {
        DEFAULT_PROBE_QUERY
    }
}

/// An open connection, exclusively owned by one operation
#[async_trait]
pub trait DriverConnection: Send {
    /// Run a statement that produces rows
    async fn query(&mut self, statement: &str, params: &[Value]) -> Result<Vec<Row>, Fault>;

    /// Run a statement and return the number of affected rows
    async fn execute(&mut self, statement: &str, params: &[Value]) -> Result<u64, Fault>;

    /// First column of the first row, or `Null` when the statement yields nothing
    async fn scalar(&mut self, statement: &str, params: &[Value]) -> Result<Value, Fault> {
        let rows = self.query(statement, params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct FixedRows(Vec<Row>);

    #[async_trait]
    impl DriverConnection for FixedRows {
        async fn query(&mut self, _statement: &str, _params: &[Value]) -> Result<Vec<Row>, Fault> {
            Ok(self.0.clone())
        }

        async fn execute(&mut self, _statement: &str, _params: &[Value]) -> Result<u64, Fault> {
            Ok(0)
        }
    }

    struct NoopDriver;

    #[async_trait]
    impl Driver for NoopDriver {
        async fn connect(&self) -> Result<Box<dyn DriverConnection>, Fault> {
            Ok(Box::new(FixedRows(Vec::new())))
        }
    }

    #[tokio::test]
    async fn test_default_scalar_takes_first_value() {
        let mut conn = FixedRows(vec![vec![json!(1), json!("x")], vec![json!(2)]]);
        let value = conn.scalar("SELECT 1", &[]).await.unwrap();
        assert_eq!(value, json!(1));
    }

    #[tokio::test]
    async fn test_default_scalar_empty_is_null() {
        let mut conn = FixedRows(Vec::new());
        let value = conn.scalar("SELECT 1", &[]).await.unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_default_probe_statement() {
        assert_eq!(NoopDriver.probe_statement(), "SELECT 1");
    }
}
