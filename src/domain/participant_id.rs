//! Type-safe participant identifier.
//!
//! [`ParticipantId`] is a newtype wrapper around [`uuid::Uuid`] so that
//! participant identifiers cannot be confused with other UUIDs, and so
//! that parsing enforces the canonical 36-character hyphenated form the
//! balance table stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Length of the canonical hyphenated UUID text form.
pub const CANONICAL_LEN: usize = 36;

/// Stable identifier of a participant tracked by the session host.
///
/// Immutable for the participant's lifetime. Used as the primary key of
/// the balance table and as the member type of
/// [`super::KnownParticipants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(uuid::Uuid);

impl ParticipantId {
    /// Creates a random `ParticipantId` (UUID v4).
    #[must_use]
    pub fn new_random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parses the canonical hyphenated form only.
    ///
    /// Simple, braced and URN forms are rejected even though they denote
    /// valid UUIDs, because the stored column is `CHAR(36)`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidIdentifier`] for anything else.
    pub fn parse(s: &str) -> Result<Self, SyncError> {
        if s.len() != CANONICAL_LEN {
            return Err(SyncError::InvalidIdentifier(s.to_string()));
        }
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SyncError::InvalidIdentifier(s.to_string()))
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Lower-case hyphenated text, as stored in the `identifier` column.
    #[must_use]
    pub fn to_canonical(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ParticipantId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.to_canonical()
    }
}
