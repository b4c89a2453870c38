//! Persistence layer: the balance table and its single connection.
//!
//! [`BalanceStore`] is what the scheduler and the HTTP surface talk to.
//! It dispatches to MySQL ([`mysql::MySqlBalanceStore`] over a
//! [`connection::ConnectionManager`]) or, with persistence disabled, to
//! [`memory::InMemoryBalanceStore`]. Every operation is best effort:
//! failures are logged here and callers get a plain result.

pub mod connection;
pub mod memory;
pub mod models;
pub mod mysql;

use std::collections::HashSet;
use std::sync::Arc;

pub use connection::ConnectionManager;
pub use memory::InMemoryBalanceStore;
pub use models::{BalanceLookup, BalanceRecord};
pub use mysql::MySqlBalanceStore;

use crate::domain::ParticipantId;
use crate::error::SyncError;

/// Storage backend for replicated balances.
#[derive(Debug, Clone)]
pub enum BalanceStore {
    /// MySQL table through one shared connection.
    MySql(MySqlBalanceStore),
    /// Process memory; nothing survives a restart.
    Memory(Arc<InMemoryBalanceStore>),
}

impl BalanceStore {
    /// Short backend name for logs and health output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MySql(_) => "mysql",
            Self::Memory(_) => "memory",
        }
    }

    /// Non-blocking connectivity probe.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        match self {
            Self::MySql(store) => store.connection().is_connected(),
            Self::Memory(store) => store.is_connected(),
        }
    }

    /// Connects if needed. Returns whether the store is usable.
    pub async fn ensure_connected(&self) -> bool {
        match self {
            Self::MySql(store) => store.connection().ensure_connected().await,
            Self::Memory(store) => store.is_connected(),
        }
    }

    /// Drops and re-establishes the connection.
    pub async fn reconnect(&self) -> bool {
        match self {
            Self::MySql(store) => store.connection().reconnect().await,
            Self::Memory(store) => store.is_connected(),
        }
    }

    /// Releases the connection. Idempotent.
    pub async fn close(&self) {
        match self {
            Self::MySql(store) => store.connection().close().await,
            Self::Memory(_) => {}
        }
    }

    /// Creates the balance table when missing.
    pub async fn create_schema_if_absent(&self) -> bool {
        match self {
            Self::MySql(store) => store.create_schema_if_absent().await,
            Self::Memory(store) => store.create_schema_if_absent().await,
        }
    }

    /// Atomically inserts or updates one participant's balance.
    pub async fn upsert_balance(&self, id: ParticipantId, display_name: &str, balance: f64) -> bool {
        match self {
            Self::MySql(store) => store.upsert_balance(id, display_name, balance).await,
            Self::Memory(store) => store.upsert_balance(id, display_name, balance).await,
        }
    }

    /// Every well-formed stored identifier; empty on failure.
    pub async fn list_all_identifiers(&self) -> HashSet<ParticipantId> {
        self.try_list_all_identifiers().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "cannot list participant identifiers");
            HashSet::new()
        })
    }

    /// Every well-formed stored identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the store is unreachable or the query
    /// fails, so startup can tell an empty table from a failed load.
    pub async fn try_list_all_identifiers(&self) -> Result<HashSet<ParticipantId>, SyncError> {
        match self {
            Self::MySql(store) => store.try_list_identifiers().await,
            Self::Memory(store) => store.try_list_identifiers().await,
        }
    }

    /// Stored balance of one participant.
    pub async fn read_balance(&self, id: ParticipantId) -> BalanceLookup {
        match self {
            Self::MySql(store) => store.read_balance(id).await,
            Self::Memory(store) => store.read_balance(id).await,
        }
    }

    /// Stored row of one participant; `None` on absence or failure.
    pub async fn read_record(&self, id: ParticipantId) -> Option<BalanceRecord> {
        match self {
            Self::MySql(store) => store.read_record(id).await,
            Self::Memory(store) => store.read_record(id).await,
        }
    }
}

impl From<MySqlBalanceStore> for BalanceStore {
    fn from(store: MySqlBalanceStore) -> Self {
        Self::MySql(store)
    }
}

impl From<Arc<InMemoryBalanceStore>> for BalanceStore {
    fn from(store: Arc<InMemoryBalanceStore>) -> Self {
        Self::Memory(store)
    }
}
