//! A participant as enumerated by the session host.

use serde::{Deserialize, Serialize};

use super::ParticipantId;

/// Name written for participants the host knows no name for.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// Maximum stored display name length, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 16;

/// Host-side view of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier.
    pub id: ParticipantId,
    /// Best-effort current name. Inactive participants may have none.
    pub display_name: Option<String>,
    /// Whether the participant is currently active on the host.
    pub online: bool,
}

impl Participant {
    /// Creates an active participant.
    #[must_use]
    pub fn online(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: Some(display_name.into()),
            online: true,
        }
    }

    /// Creates an inactive participant.
    #[must_use]
    pub fn offline(id: ParticipantId, display_name: Option<String>) -> Self {
        Self {
            id,
            display_name,
            online: false,
        }
    }

    /// Name to persist: the known name or [`UNKNOWN_DISPLAY_NAME`].
    #[must_use]
    pub fn name_or_unknown(&self) -> &str {
        self.display_name.as_deref().unwrap_or(UNKNOWN_DISPLAY_NAME)
    }
}

/// Truncates `name` to the stored column width on a character boundary.
#[must_use]
pub fn clamp_display_name(name: &str) -> String {
    name.chars().take(MAX_DISPLAY_NAME_CHARS).collect()
}
