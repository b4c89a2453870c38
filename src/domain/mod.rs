//! Domain layer: participant identity, host notifications, and the
//! known-participant registry.
//!
//! This module holds the types the scheduler reasons about: who a
//! participant is, the join/leave events the host reports, the event
//! bus carrying them, and the in-memory set of participants that have
//! already been written to storage.

pub mod event_bus;
pub mod known_participants;
pub mod participant;
pub mod participant_event;
pub mod participant_id;

pub use event_bus::EventBus;
pub use known_participants::KnownParticipants;
pub use participant::Participant;
pub use participant_event::ParticipantEvent;
pub use participant_id::ParticipantId;
