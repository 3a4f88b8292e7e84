//! Scoped connection acquisition
//!
//! [`ConnectionProvider::acquire`] opens exactly one driver connection and
//! hands it out as a [`ConnectionHandle`]. The handle owns the connection and
//! closes it when dropped, so every exit path of the owning operation
//! (return, `?`, cancellation by dropping the future) releases it exactly once.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::Fault;
use crate::driver::{Driver, DriverConnection};

/// Opens one connection per [`acquire`](ConnectionProvider::acquire) through a [`Driver`]
pub struct ConnectionProvider {
    driver: Arc<dyn Driver>,
    connect_timeout: Duration,
    next_id: AtomicU64,
}

impl fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("driver", &"<Driver>")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectionProvider {
    /// `connect_timeout` bounds every connection attempt
    pub fn new(driver: Arc<dyn Driver>, connect_timeout: Duration) -> Self {
        Self {
            driver,
            connect_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Open a connection.
    ///
    /// Fails with a wrapped driver fault when the engine cannot be reached,
    /// with a `HYT01` fault when `connect_timeout` expires, and with a
    /// cancelled fault when `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<ConnectionHandle, Fault> {
        let connect = tokio::time::timeout(self.connect_timeout, self.driver.connect());

        let connection = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("Connection acquisition cancelled");
                return Err(Fault::cancelled("connection acquisition"));
            }
            result = connect => match result {
                Ok(Ok(connection)) => connection,
                Ok(Err(fault)) => {
                    tracing::debug!(error = %fault, code = ?fault.code(), "Failed to open database connection");
                    return Err(Fault::wrap(format!("Unable to connect to database: {fault}"), fault));
                }
                Err(_) => {
                    tracing::debug!(timeout = ?self.connect_timeout, "Database connection attempt timed out");
                    let fault = Fault::connect_timeout(self.connect_timeout);
                    return Err(Fault::wrap(format!("Unable to connect to database: {fault}"), fault));
                }
            },
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection.id = id, "Database connection opened");
        #[cfg(feature = "metrics")]
        crate::observability::record_connection_opened();

        Ok(ConnectionHandle {
            id,
            opened_at: Instant::now(),
            connection,
        })
    }
}

/// Exclusively owned open connection; closes on drop
pub struct ConnectionHandle {
    id: u64,
    opened_at: Instant,
    connection: Box<dyn DriverConnection>,
}

impl ConnectionHandle {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Close the connection now instead of at the end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for ConnectionHandle {
    type Target = dyn DriverConnection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl DerefMut for ConnectionHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        tracing::debug!(
            connection.id = self.id,
            held_ms = self.opened_at.elapsed().as_millis() as u64,
            "Database connection closed"
        );
        #[cfg(feature = "metrics")]
        crate::observability::record_connection_closed();
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("opened_at", &self.opened_at)
            .finish_non_exhaustive()
    }
}
