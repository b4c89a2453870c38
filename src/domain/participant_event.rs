//! Session-host notifications consumed by the sync scheduler.
//!
//! Every join and leave the host reports becomes a [`ParticipantEvent`]
//! published on the [`super::EventBus`]. The scheduler decides from the
//! event kind and its policy whether a balance write follows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParticipantId;

/// Join or leave notification for a single participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ParticipantEvent {
    /// Emitted once the participant has finished joining.
    ParticipantJoined {
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Name at join time.
        display_name: String,
        /// When the host observed the join.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when the participant departs.
    ParticipantLeft {
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Name at departure.
        display_name: String,
        /// When the host observed the departure.
        timestamp: DateTime<Utc>,
    },
}

impl ParticipantEvent {
    /// Builds a join event stamped with the current time.
    #[must_use]
    pub fn joined(participant_id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self::ParticipantJoined {
            participant_id,
            display_name: display_name.into(),
            timestamp: Utc::now(),
        }
    }

    /// Builds a leave event stamped with the current time.
    #[must_use]
    pub fn left(participant_id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self::ParticipantLeft {
            participant_id,
            display_name: display_name.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns the participant this event concerns.
    #[must_use]
    pub fn participant_id(&self) -> ParticipantId {
        match self {
            Self::ParticipantJoined { participant_id, .. }
            | Self::ParticipantLeft { participant_id, .. } => *participant_id,
        }
    }

    /// Returns the display name carried by the event.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::ParticipantJoined { display_name, .. }
            | Self::ParticipantLeft { display_name, .. } => display_name,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantLeft { .. } => "participant_left",
        }
    }
}
