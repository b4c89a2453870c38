//! Host ingress payloads and balance lookup responses.

use serde::{Deserialize, Serialize};

use crate::domain::{Participant, ParticipantEvent, ParticipantId};

/// One participant as pushed by the host in `PUT /participants`.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantStateDto {
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Current name, if the host has one.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Live balance.
    pub balance: f64,
    /// Whether the participant is active.
    #[serde(default)]
    pub online: bool,
}

impl From<&ParticipantStateDto> for Participant {
    fn from(dto: &ParticipantStateDto) -> Self {
        Self {
            id: dto.participant_id,
            display_name: dto.display_name.clone(),
            online: dto.online,
        }
    }
}

/// Kind of host notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Participant finished joining.
    ParticipantJoined,
    /// Participant is leaving.
    ParticipantLeft,
}

/// Body of `POST /events`.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantEventRequest {
    /// Join or leave.
    pub event_type: EventKind,
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Current name.
    pub display_name: String,
    /// Live balance at the time of the event, if the host sends it.
    #[serde(default)]
    pub balance: Option<f64>,
}

impl ParticipantEventRequest {
    /// Builds the domain event, stamped now.
    #[must_use]
    pub fn to_event(&self) -> ParticipantEvent {
        match self.event_type {
            EventKind::ParticipantJoined => {
                ParticipantEvent::joined(self.participant_id, self.display_name.clone())
            }
            EventKind::ParticipantLeft => {
                ParticipantEvent::left(self.participant_id, self.display_name.clone())
            }
        }
    }
}

/// Response of `POST /events`.
#[derive(Debug, Clone, Serialize)]
pub struct EventAcceptedResponse {
    /// Event type that was queued.
    pub event_type: &'static str,
    /// Participant concerned.
    pub participant_id: ParticipantId,
    /// Subscribers that received the event.
    pub delivered_to: usize,
}

/// Response of `GET /participants/{id}/balance`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredBalanceResponse {
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Stored balance.
    pub balance: f64,
}
