//! Fault values raised by the database layer
//!
//! A [`Fault`] mirrors the shape every native driver can produce:
//! an optional short code (SQLSTATE), a message and an optional cause.
//! Faults never leave the process; they are classified at the HTTP boundary
//! and logged.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{SQLSTATE_CONNECTION_TIMEOUT, SQLSTATE_TIMEOUT_EXPIRED};

/// Where a fault originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Raised by the native driver, or a driver-equivalent timeout
    Driver,
    /// Context added around a cause by the provider or executor
    Wrapped,
    /// No driver shape: row mapping failures, panics, task failures
    Internal,
    /// The caller cancelled the operation
    Cancelled,
}

impl FaultKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Wrapped => "wrapped",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised while acquiring a connection or running a statement.
///
/// Displays as its own message; the cause is exposed through
/// [`std::error::Error::source`] and [`Fault::chain`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Fault {
    kind: FaultKind,
    code: Option<String>,
    message: String,
    #[source]
    cause: Option<Box<Fault>>,
}

impl Fault {
    /// Fault reported by the native driver
    pub fn driver(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Driver,
            code: None,
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap `cause` with additional context, preserving it as the source
    pub fn wrap(message: impl Into<String>, cause: Self) -> Self {
        Self {
            kind: FaultKind::Wrapped,
            code: None,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Fault with no driver shape, such as a row mapping failure or a panic
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Internal,
            code: None,
            message: message.into(),
            cause: None,
        }
    }

    /// `operation` was abandoned because its cancellation token fired
    pub fn cancelled(operation: &str) -> Self {
        Self {
            kind: FaultKind::Cancelled,
            code: None,
            message: format!("{operation} cancelled by caller"),
            cause: None,
        }
    }

    /// Connection could not be opened within `timeout`
    pub fn connect_timeout(timeout: Duration) -> Self {
        Self::driver(format!("Connection attempt timed out after {timeout:?}"))
            .with_code(SQLSTATE_CONNECTION_TIMEOUT)
    }

    /// Statement did not complete within `timeout`
    pub fn statement_timeout(timeout: Duration) -> Self {
        Self::driver(format!("Query timeout expired after {timeout:?}"))
            .with_code(SQLSTATE_TIMEOUT_EXPIRED)
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach `cause` below this fault, replacing any existing cause
    #[must_use]
    pub fn caused_by(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        self.kind
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn cause(&self) -> Option<&Self> {
        self.cause.as_deref()
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, FaultKind::Cancelled)
    }

    /// Iterate over this fault followed by its causes, outermost first
    pub fn chain(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |f| f.cause())
    }

    /// First driver-shaped fault in the chain, if any
    #[must_use]
    pub fn driver_fault(&self) -> Option<&Self> {
        self.chain().find(|f| f.kind == FaultKind::Driver)
    }

    /// Code of the first driver fault, for logging
    #[must_use]
    pub fn driver_code(&self) -> Option<&str> {
        self.driver_fault().and_then(Self::code)
    }
}
