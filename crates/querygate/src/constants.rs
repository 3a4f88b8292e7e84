//! Constants for the query service

/// Probe statement used when a driver does not supply its own
pub const DEFAULT_PROBE_QUERY: &str = "SELECT 1";

/// Probe statement for SAP HANA (`DUMMY` is the single-row system table)
pub const HANA_PROBE_QUERY: &str = "SELECT 1 FROM DUMMY";

/// Value the health probe expects back
pub const PROBE_EXPECTED_VALUE: i64 = 1;

/// SQL query to list tables in the current schema
pub const LIST_TABLES_CURRENT_SCHEMA: &str =
    "SELECT TABLE_NAME, TABLE_TYPE, COMMENTS FROM SYS.TABLES WHERE SCHEMA_NAME = CURRENT_SCHEMA";

// SQLSTATE codes treated as transient connectivity trouble
pub const SQLSTATE_CONNECTION_FAILURE: &str = "08001";
pub const SQLSTATE_COMMUNICATION_LINK_FAILURE: &str = "08S01";
pub const SQLSTATE_TIMEOUT_EXPIRED: &str = "HYT00";
pub const SQLSTATE_CONNECTION_TIMEOUT: &str = "HYT01";

/// Default `Retry-After` hint in seconds for 503 responses
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Name of the database entry in the health report
pub const HEALTH_CHECK_NAME: &str = "database";

/// Bounds for the diagnostic slow endpoint, in seconds
pub const SLOW_DEFAULT_DELAY_SECS: u64 = 8;
pub const SLOW_MIN_DELAY_SECS: u64 = 1;
pub const SLOW_MAX_DELAY_SECS: u64 = 30;

/// Non-standard status used when the server abandons a request
pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;
