//! MySQL implementation of the balance store.
//!
//! Every statement runs on a [`Lease`] of the shared connection. The
//! `try_*` methods return [`SyncError`]; the public best-effort methods
//! wrap them, log failures, and return a plain result so database trouble
//! never reaches the session host.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::connection::{ConnectionManager, Lease};
use super::models::{BalanceLookup, BalanceRecord};
use crate::domain::ParticipantId;
use crate::domain::participant::clamp_display_name;
use crate::error::SyncError;

/// Balance table backed by MySQL through a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct MySqlBalanceStore {
    connection: Arc<ConnectionManager>,
    table: String,
}

impl MySqlBalanceStore {
    /// Creates a store writing to the configured table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the table name is not a plain
    /// identifier.
    pub fn new(connection: Arc<ConnectionManager>) -> Result<Self, SyncError> {
        let table = connection.config().table.clone();
        crate::config::validate_table_name(&table)?;
        Ok(Self { connection, table })
    }

    /// Shared connection manager.
    #[must_use]
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Creates the balance table when missing.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if connecting or the DDL fails.
    pub async fn try_create_schema(&self) -> Result<(), SyncError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS `{}` (\
             identifier CHAR(36) NOT NULL PRIMARY KEY, \
             display_name VARCHAR(16) NOT NULL, \
             balance DOUBLE NOT NULL, \
             last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP\
             )",
            self.table
        );
        let mut lease = self.connection.lease().await?;
        let result = sqlx::query(&sql).execute(lease.connection()?).await;
        settle(lease, result)?;
        Ok(())
    }

    /// Inserts or updates one balance in a single statement.
    ///
    /// `last_updated` is refreshed explicitly so that rewriting an
    /// unchanged balance still moves the timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if connecting or the statement fails.
    pub async fn try_upsert(
        &self,
        id: ParticipantId,
        display_name: &str,
        balance: f64,
    ) -> Result<(), SyncError> {
        let sql = format!(
            "INSERT INTO `{}` (identifier, display_name, balance) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE display_name = ?, balance = ?, last_updated = CURRENT_TIMESTAMP",
            self.table
        );
        let name = clamp_display_name(display_name);
        let mut lease = self.connection.lease().await?;
        let result = sqlx::query(&sql)
            .bind(id.to_canonical())
            .bind(&name)
            .bind(balance)
            .bind(&name)
            .bind(balance)
            .execute(lease.connection()?)
            .await;
        settle(lease, result)?;
        Ok(())
    }

    /// Reads every stored identifier, skipping malformed rows.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if connecting or the query fails.
    pub async fn try_list_identifiers(&self) -> Result<HashSet<ParticipantId>, SyncError> {
        let sql = format!("SELECT identifier FROM `{}`", self.table);
        let mut lease = self.connection.lease().await?;
        let result = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(lease.connection()?)
            .await;
        let rows = settle(lease, result)?;
        Ok(parse_identifiers(rows))
    }

    /// Reads one stored row.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if connecting or the query fails.
    pub async fn try_read_record(
        &self,
        id: ParticipantId,
    ) -> Result<Option<BalanceRecord>, SyncError> {
        let sql = format!(
            "SELECT display_name, balance, last_updated FROM `{}` WHERE identifier = ?",
            self.table
        );
        let mut lease = self.connection.lease().await?;
        let result = sqlx::query_as::<_, (String, f64, DateTime<Utc>)>(&sql)
            .bind(id.to_canonical())
            .fetch_optional(lease.connection()?)
            .await;
        let row = settle(lease, result)?;
        Ok(row.map(|(display_name, balance, last_updated)| BalanceRecord {
            identifier: id,
            display_name,
            balance,
            last_updated,
        }))
    }

    /// Creates the table if absent. Logs and returns `false` on failure.
    pub async fn create_schema_if_absent(&self) -> bool {
        match self.try_create_schema().await {
            Ok(()) => {
                tracing::info!(table = %self.table, "table checked/created");
                true
            }
            Err(e) => {
                tracing::error!(table = %self.table, error = %e, "cannot create table");
                false
            }
        }
    }

    /// Upserts a balance. Logs and returns `false` on failure.
    pub async fn upsert_balance(&self, id: ParticipantId, display_name: &str, balance: f64) -> bool {
        match self.try_upsert(id, display_name, balance).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%id, display_name, error = %e, "skipping balance update");
                false
            }
        }
    }

    /// Reads a stored balance, distinguishing absence from failure.
    pub async fn read_balance(&self, id: ParticipantId) -> BalanceLookup {
        match self.try_read_record(id).await {
            Ok(Some(record)) => BalanceLookup::Found(record.balance),
            Ok(None) => BalanceLookup::NotFound,
            Err(e) => {
                tracing::warn!(%id, error = %e, "cannot read participant balance");
                BalanceLookup::Unavailable
            }
        }
    }

    /// Reads a stored row. `None` on absence or failure.
    pub async fn read_record(&self, id: ParticipantId) -> Option<BalanceRecord> {
        self.try_read_record(id).await.unwrap_or_else(|e| {
            tracing::warn!(%id, error = %e, "cannot read participant record");
            None
        })
    }
}

/// Converts a driver result, discarding the connection if it broke.
fn settle<T>(lease: Lease<'_>, result: Result<T, sqlx::Error>) -> Result<T, SyncError> {
    result.map_err(|e| {
        let err = SyncError::Database(e);
        if err.is_connection_lost() {
            lease.discard();
        }
        err
    })
}

/// Parses stored identifier strings, logging and skipping bad ones.
pub(crate) fn parse_identifiers(rows: impl IntoIterator<Item = String>) -> HashSet<ParticipantId> {
    rows.into_iter()
        .filter_map(|raw| match ParticipantId::parse(raw.trim_end()) {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(identifier = %raw, "invalid identifier in database");
                None
            }
        })
        .collect()
}
