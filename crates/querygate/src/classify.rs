//! Fault classification
//!
//! Maps a [`Fault`] to one of three operational categories:
//! - `TransientConnectivity`: engine unreachable or timed out, retry later
//! - `QueryExecution`: engine reached but rejected or failed the statement
//! - `Unknown`: no driver-shaped fault anywhere in the chain
//!
//! The structured SQLSTATE is checked first because drivers guarantee it when
//! present. Message matching is the fallback for drivers that leave it empty.
//! A statement-level timeout whose message mentions "timeout" is reported as
//! connectivity trouble; callers see a 503 for it.

use std::fmt;

use serde::Serialize;

use crate::Fault;
use crate::constants::{
    SQLSTATE_COMMUNICATION_LINK_FAILURE, SQLSTATE_CONNECTION_FAILURE, SQLSTATE_CONNECTION_TIMEOUT,
    SQLSTATE_TIMEOUT_EXPIRED,
};

/// SQLSTATE codes that always mean transient connectivity trouble
pub const TRANSIENT_SQLSTATES: [&str; 4] = [
    SQLSTATE_CONNECTION_FAILURE,
    SQLSTATE_COMMUNICATION_LINK_FAILURE,
    SQLSTATE_TIMEOUT_EXPIRED,
    SQLSTATE_CONNECTION_TIMEOUT,
];

/// Lowercase message fragments that indicate connectivity trouble
pub const TRANSIENT_MESSAGE_HINTS: [&str; 5] = [
    "connection",
    "timeout",
    "network",
    "host",
    "unable to connect",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    TransientConnectivity,
    QueryExecution,
    Unknown,
}

impl Classification {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransientConnectivity => "transient_connectivity",
            Self::QueryExecution => "query_execution",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::TransientConnectivity)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a fault. Pure and deterministic.
#[must_use]
pub fn classify(fault: &Fault) -> Classification {
    let Some(driver) = fault.driver_fault() else {
        return Classification::Unknown;
    };

    if driver.code().is_some_and(is_transient_code) || is_transient_message(driver.message()) {
        Classification::TransientConnectivity
    } else {
        Classification::QueryExecution
    }
}

/// Whether `code` is one of [`TRANSIENT_SQLSTATES`] (case-insensitive)
#[must_use]
pub fn is_transient_code(code: &str) -> bool {
    TRANSIENT_SQLSTATES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(code.trim()))
}

/// Whether `message` contains any of [`TRANSIENT_MESSAGE_HINTS`] (case-insensitive)
#[must_use]
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MESSAGE_HINTS
        .iter()
        .any(|hint| lower.contains(hint))
}
