//! In-process balance store.
//!
//! Used when `PERSISTENCE_ENABLED=false` and by tests. Rows are keyed by
//! the raw identifier text, like the real table, so malformed rows can
//! exist and are filtered on listing exactly as with MySQL. The store can
//! be switched offline to exercise the not-connected paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::{BalanceLookup, BalanceRecord};
use super::mysql::parse_identifiers;
use crate::domain::ParticipantId;
use crate::domain::participant::clamp_display_name;
use crate::error::SyncError;

#[derive(Debug, Clone)]
struct Row {
    display_name: String,
    balance: f64,
    last_updated: DateTime<Utc>,
}

/// Balance table held in memory.
#[derive(Debug)]
pub struct InMemoryBalanceStore {
    rows: RwLock<HashMap<String, Row>>,
    online: AtomicBool,
    writes: AtomicUsize,
}

impl Default for InMemoryBalanceStore {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }
}

impl InMemoryBalanceStore {
    /// Creates an empty, connected store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing (`false`) or regaining (`true`) the connection.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Returns `true` while the store accepts operations.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Number of successful upserts so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }

    #[cfg(test)]
    async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Plants a row under an arbitrary identifier string.
    #[cfg(test)]
    async fn insert_raw(&self, raw: &str, display_name: &str, balance: f64) {
        self.rows.write().await.insert(
            raw.to_string(),
            Row {
                display_name: display_name.to_string(),
                balance,
                last_updated: Utc::now(),
            },
        );
    }

    /// Always succeeds while connected; there is no schema to create.
    pub async fn create_schema_if_absent(&self) -> bool {
        self.is_connected()
    }

    /// Inserts or replaces the row for `id`.
    pub async fn upsert_balance(&self, id: ParticipantId, display_name: &str, balance: f64) -> bool {
        if !self.is_connected() {
            tracing::warn!(%id, display_name, "skipping balance update - store offline");
            return false;
        }
        self.rows.write().await.insert(
            id.to_canonical(),
            Row {
                display_name: clamp_display_name(display_name),
                balance,
                last_updated: Utc::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Lists well-formed identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while offline.
    pub async fn try_list_identifiers(&self) -> Result<HashSet<ParticipantId>, SyncError> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let keys: Vec<String> = self.rows.read().await.keys().cloned().collect();
        Ok(parse_identifiers(keys))
    }

    /// Reads a stored balance.
    pub async fn read_balance(&self, id: ParticipantId) -> BalanceLookup {
        if !self.is_connected() {
            return BalanceLookup::Unavailable;
        }
        self.rows
            .read()
            .await
            .get(&id.to_canonical())
            .map_or(BalanceLookup::NotFound, |row| BalanceLookup::Found(row.balance))
    }

    /// Reads a stored row.
    pub async fn read_record(&self, id: ParticipantId) -> Option<BalanceRecord> {
        if !self.is_connected() {
            return None;
        }
        self.rows
            .read()
            .await
            .get(&id.to_canonical())
            .map(|row| BalanceRecord {
                identifier: id,
                display_name: row.display_name.clone(),
                balance: row.balance,
                last_updated: row.last_updated,
            })
    }
}
