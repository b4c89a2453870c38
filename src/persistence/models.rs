//! Row and lookup types for the balance table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ParticipantId;

/// A stored row of the balance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Primary key.
    pub identifier: ParticipantId,
    /// Name at the time of the last write.
    pub display_name: String,
    /// Replicated balance. May be negative.
    pub balance: f64,
    /// Server-assigned time of the last write.
    pub last_updated: DateTime<Utc>,
}

/// Outcome of reading a single stored balance.
///
/// Absence and an unreachable store are distinct from any balance value,
/// including zero and negative amounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalanceLookup {
    /// A record exists with this balance.
    Found(f64),
    /// No record exists for the identifier.
    NotFound,
    /// The store could not answer (not connected or the query failed).
    Unavailable,
}
