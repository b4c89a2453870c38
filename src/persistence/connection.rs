//! Lifecycle of the single shared MySQL connection.
//!
//! [`ConnectionManager`] owns at most one [`MySqlConnection`]. Every user
//! goes through [`ConnectionManager::lease`], which holds the lock for the
//! duration of one operation, so the connection is never used by two
//! tasks at once and concurrent callers never open a second one.

use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::Connection;
use sqlx::mysql::MySqlConnection;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::DatabaseConfig;
use crate::error::SyncError;

/// Lazily connected, lock-guarded single connection.
#[derive(Debug)]
pub struct ConnectionManager {
    config: DatabaseConfig,
    slot: Mutex<Option<MySqlConnection>>,
    connected: AtomicBool,
}

/// Exclusive use of the connection for one operation.
///
/// Dropping the lease releases the lock on every exit path.
#[derive(Debug)]
pub struct Lease<'a> {
    slot: MutexGuard<'a, Option<MySqlConnection>>,
    connected: &'a AtomicBool,
}

impl ConnectionManager {
    /// Creates a manager in the disconnected state. No I/O happens here.
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Settings this manager connects with.
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Non-blocking liveness probe. Never waits on the connection lock.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Connects if needed and reports whether a connection is held.
    ///
    /// Safe to call concurrently: the check and the connect happen under
    /// the same lock.
    pub async fn ensure_connected(&self) -> bool {
        self.lease().await.is_ok()
    }

    /// Acquires the connection, connecting first if none is held.
    ///
    /// # Errors
    ///
    /// Returns the connect failure ([`SyncError::Database`],
    /// [`SyncError::ConnectTimeout`] or [`SyncError::Config`]).
    pub async fn lease(&self) -> Result<Lease<'_>, SyncError> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            *slot = Some(self.connect().await?);
            self.connected.store(true, Ordering::Release);
        }
        Ok(Lease {
            slot,
            connected: &self.connected,
        })
    }

    /// Drops the current connection, tolerating close errors, and connects
    /// again.
    pub async fn reconnect(&self) -> bool {
        {
            let mut slot = self.slot.lock().await;
            if let Some(conn) = slot.take() {
                self.connected.store(false, Ordering::Release);
                if let Err(e) = conn.close().await {
                    tracing::warn!(error = %e, "error closing old connection");
                }
            }
        }
        self.ensure_connected().await
    }

    /// Best-effort release of the connection. Idempotent.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        let Some(conn) = slot.take() else {
            return;
        };
        self.connected.store(false, Ordering::Release);
        match conn.close().await {
            Ok(()) => tracing::info!("database connection closed"),
            Err(e) => tracing::warn!(error = %e, "error closing database connection"),
        }
    }

    async fn connect(&self) -> Result<MySqlConnection, SyncError> {
        let options = self.config.connect_options()?;
        let url = self.config.connection_url();
        let timeout = self.config.connect_timeout;

        match tokio::time::timeout(timeout, MySqlConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => {
                tracing::info!(%url, "connected to database");
                Ok(conn)
            }
            Ok(Err(e)) => {
                tracing::error!(%url, error = %e, "error connecting to database");
                Err(SyncError::Database(e))
            }
            Err(_) => {
                tracing::error!(%url, timeout_secs = timeout.as_secs(), "database connect timed out");
                Err(SyncError::ConnectTimeout(timeout.as_secs()))
            }
        }
    }
}

impl Lease<'_> {
    /// The leased connection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] if the lease was emptied by a
    /// concurrent close.
    pub fn connection(&mut self) -> Result<&mut MySqlConnection, SyncError> {
        self.slot.as_mut().ok_or(SyncError::NotConnected)
    }

    /// Throws the connection away so the next lease reconnects.
    ///
    /// Used after connection-level failures; the dead socket is dropped
    /// without a close handshake.
    pub fn discard(mut self) {
        if self.slot.take().is_some() {
            self.connected.store(false, Ordering::Release);
            tracing::warn!("discarded broken database connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".to_string(),
            // Port 1 is reserved (tcpmux) and refused on any test host.
            port: 1,
            name: "vault".to_string(),
            username: "root".to_string(),
            password: String::new(),
            table: "player_money".to_string(),
            ssl_mode: "disabled".to_string(),
            connect_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let manager = ConnectionManager::new(unreachable_config());
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn failed_connect_is_reported_not_raised() {
        let manager = ConnectionManager::new(unreachable_config());
        assert!(!manager.ensure_connected().await);
        assert!(!manager.is_connected());
        assert!(manager.lease().await.is_err());
    }

    #[tokio::test]
    async fn close_is_idempotent_when_disconnected() {
        let manager = ConnectionManager::new(unreachable_config());
        manager.close().await;
        manager.close().await;
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn reconnect_to_unreachable_host_fails_cleanly() {
        let manager = ConnectionManager::new(unreachable_config());
        assert!(!manager.reconnect().await);
        assert!(!manager.is_connected());
    }
}
