//! SAP HANA backend built on `hdbconnect_async`

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use hdbconnect_async::{Connection, HdbError, HdbResponse, HdbValue, ServerError};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{Driver, DriverConnection, Row};
use crate::Fault;
use crate::constants::HANA_PROBE_QUERY;

/// Opens one `hdbconnect_async` connection per [`Driver::connect`] call
#[derive(Clone)]
pub struct HanaDriver {
    url: String,
}

impl HanaDriver {
    #[must_use]
    pub fn new(url: &Url) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

// The URL may carry credentials
impl fmt::Debug for HanaDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HanaDriver").finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for HanaDriver {
    async fn connect(&self) -> Result<Box<dyn DriverConnection>, Fault> {
        let connection = Connection::new(self.url.clone())
            .await
            .map_err(|e| hdb_fault(&e))?;
        Ok(Box::new(HanaConnection { connection }))
    }

    fn probe_statement(&self) -> &str {
        HANA_PROBE_QUERY
    }
}

struct HanaConnection {
    connection: Connection,
}

#[async_trait]
impl DriverConnection for HanaConnection {
    async fn query(&mut self, statement: &str, params: &[Value]) -> Result<Vec<Row>, Fault> {
        let result = if params.is_empty() {
            self.connection.query(statement).await
        } else {
            let values = bind_values(params);
            let mut prepared = self
                .connection
                .prepare(statement)
                .await
                .map_err(|e| hdb_fault(&e))?;
            prepared
                .execute(&values)
                .await
                .and_then(HdbResponse::into_result_set)
        };
        let result_set = result.map_err(|e| hdb_fault(&e))?;
        let rows = result_set.into_rows().await.map_err(|e| hdb_fault(&e))?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| hdb_value_to_json(&v)).collect())
            .collect())
    }

    async fn execute(&mut self, statement: &str, params: &[Value]) -> Result<u64, Fault> {
        let result = if params.is_empty() {
            self.connection.dml(statement).await
        } else {
            let values = bind_values(params);
            let mut prepared = self
                .connection
                .prepare(statement)
                .await
                .map_err(|e| hdb_fault(&e))?;
            prepared
                .execute(&values)
                .await
                .and_then(HdbResponse::into_affected_rows)
                .map(|counts| counts.into_iter().sum())
        };
        let affected = result.map_err(|e| hdb_fault(&e))?;

        Ok(affected as u64)
    }
}

/// Parameter value accepted by `PreparedStatement::execute`, which binds
/// through serde
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&Value> for BindValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Value::String(s) => Self::String(s.clone()),
            // Structured values are bound as their JSON text
            Value::Array(_) | Value::Object(_) => Self::String(value.to_string()),
        }
    }
}

fn bind_values(params: &[Value]) -> Vec<BindValue> {
    params.iter().map(BindValue::from).collect()
}

/// Convert a driver error into a fault.
///
/// `HdbError` only names its category in `Display`; the server's text and
/// SQLSTATE live further down the source chain. The fault message joins the
/// whole chain, the code comes from the first `ServerError` found (or from
/// the text for errors that embed server output), and the lower levels are
/// kept as the fault's causes.
fn hdb_fault(err: &HdbError) -> Fault {
    let chain: Vec<&(dyn StdError + 'static)> =
        std::iter::successors(Some(err as &(dyn StdError + 'static)), |e: &&(dyn StdError + 'static)| (*e).source()).collect();

    let message = chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");

    let code = chain
        .iter()
        .find_map(|e| e.downcast_ref::<ServerError>())
        .and_then(|server| sqlstate_code(server.sqlstate()))
        .or_else(|| extract_sqlstate(&message));

    let causes = chain.iter().skip(1).rev().fold(None, |cause, level| {
        let fault = Fault::internal(level.to_string());
        Some(match cause {
            Some(cause) => fault.caused_by(cause),
            None => fault,
        })
    });

    let mut fault = Fault::driver(message);
    if let Some(cause) = causes {
        fault = fault.caused_by(cause);
    }
    if let Some(code) = code {
        fault = fault.with_code(code);
    }
    fault
}

/// SQLSTATE bytes as reported by the server; blank or malformed means none
fn sqlstate_code(raw: &[u8]) -> Option<String> {
    let code = std::str::from_utf8(raw).ok()?.trim();
    (code.len() == 5 && code.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| code.to_ascii_uppercase())
}

/// Extract a five character SQLSTATE from a driver message.
///
/// Recognises `sql state: 42000` and `SQLSTATE 42000` forms.
fn extract_sqlstate(msg: &str) -> Option<String> {
    let lower = msg.to_ascii_lowercase();
    let start = ["sql state:", "sqlstate:", "sqlstate"]
        .iter()
        .find_map(|marker| lower.find(marker).map(|pos| pos + marker.len()))?;

    let code: String = msg[start..]
        .trim_start()
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect();

    (code.len() == 5).then(|| code.to_ascii_uppercase())
}

/// Convert `HdbValue` to `serde_json::Value`
fn hdb_value_to_json(value: &HdbValue) -> Value {
    match value {
        HdbValue::NULL => Value::Null,
        HdbValue::TINYINT(v) => serde_json::json!(v),
        HdbValue::SMALLINT(v) => serde_json::json!(v),
        HdbValue::INT(v) => serde_json::json!(v),
        HdbValue::BIGINT(v) => serde_json::json!(v),
        HdbValue::DECIMAL(v) => serde_json::json!(v.to_string()),
        HdbValue::REAL(v) => serde_json::json!(v),
        HdbValue::DOUBLE(v) => serde_json::json!(v),
        HdbValue::STRING(v) => serde_json::json!(v),
        HdbValue::BOOLEAN(v) => serde_json::json!(v),
        _ => serde_json::json!(format!("{value:?}")),
    }
}
