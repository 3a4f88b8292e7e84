//! Table listing for the current schema

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::Fault;
use crate::constants::LIST_TABLES_CURRENT_SCHEMA;
use crate::executor::QueryExecutor;

/// One table of the current schema, in `SYS.TABLES` column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: Option<String>,
    pub comment: Option<String>,
}

/// Source of table metadata
#[async_trait]
pub trait TableRepository: Send + Sync {
    async fn list_tables(&self, cancel: &CancellationToken) -> Result<Vec<TableInfo>, Fault>;
}

/// [`TableRepository`] backed by the database catalog
#[derive(Debug, Clone)]
pub struct TableCatalog {
    executor: QueryExecutor,
}

impl TableCatalog {
    #[must_use]
    pub const fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl TableRepository for TableCatalog {
    async fn list_tables(&self, cancel: &CancellationToken) -> Result<Vec<TableInfo>, Fault> {
        let tables: Vec<TableInfo> = self
            .executor
            .query(LIST_TABLES_CURRENT_SCHEMA, &[], cancel)
            .await?;
        tracing::debug!(count = tables.len(), "Listed tables");
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::driver::{Driver, DriverConnection, Row};
    use crate::provider::ConnectionProvider;
    use crate::{Classification, classify};

    struct CatalogConnection(Result<Vec<Row>, Fault>);

    #[async_trait]
    impl DriverConnection for CatalogConnection {
        async fn query(&mut self, statement: &str, _p: &[Value]) -> Result<Vec<Row>, Fault> {
            assert!(statement.contains("SYS.TABLES"));
            self.0.clone()
        }

        async fn execute(&mut self, _s: &str, _p: &[Value]) -> Result<u64, Fault> {
            Ok(0)
        }
    }

    struct CatalogDriver(Result<Vec<Row>, Fault>);

    #[async_trait]
    impl Driver for CatalogDriver {
        async fn connect(&self) -> Result<Box<dyn DriverConnection>, Fault> {
            Ok(Box::new(CatalogConnection(self.0.clone())))
        }
    }

    fn catalog(reply: Result<Vec<Row>, Fault>) -> TableCatalog {
        let provider = ConnectionProvider::new(Arc::new(CatalogDriver(reply)), Duration::from_secs(1));
        TableCatalog::new(QueryExecutor::new(Arc::new(provider), Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_list_tables_maps_columns() {
        let tables = catalog(Ok(vec![
            vec![json!("ORDERS"), json!("COLUMN"), json!("Customer orders")],
            vec![json!("TMP"), json!("ROW"), Value::Null],
        ]))
        .list_tables(&CancellationToken::new())
        .await
        .unwrap();

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "ORDERS");
        assert_eq!(tables[0].table_type.as_deref(), Some("COLUMN"));
        assert_eq!(tables[0].comment.as_deref(), Some("Customer orders"));
        assert!(tables[1].comment.is_none());
    }

    #[tokio::test]
    async fn test_list_tables_propagates_fault() {
        let fault = catalog(Err(Fault::driver("invalid table name").with_code("42S02")))
            .list_tables(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(fault.message().starts_with("Query execution failed"));
        assert_eq!(classify(&fault), Classification::QueryExecution);
    }

    #[test]
    fn test_table_info_serializes_type_field() {
        let info = TableInfo {
            name: "T".into(),
            table_type: Some("ROW".into()),
            comment: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "ROW");
        assert!(json["comment"].is_null());
    }
}
