//! Boundary to the live session host.
//!
//! The host owns the authoritative balances and the participant roster.
//! The scheduler only needs the two read-only views below; both are
//! synchronous and expected to be cheap.

pub mod mirror;

pub use mirror::HostMirror;

use crate::domain::{Participant, ParticipantId};

/// Source of live, authoritative balances.
pub trait BalanceAuthority: Send + Sync + std::fmt::Debug {
    /// Current balance of `participant`, or `None` if the host has not
    /// reported one.
    fn balance(&self, participant: &ParticipantId) -> Option<f64>;
}

/// Participant roster of the session host.
pub trait SessionHost: Send + Sync + std::fmt::Debug {
    /// Participants currently active.
    fn active_participants(&self) -> Vec<Participant>;

    /// Every participant the host has ever seen, active or not.
    fn all_participants(&self) -> Vec<Participant>;
}
