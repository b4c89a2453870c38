//! In-process copy of the host's roster and balances.
//!
//! A host process that cannot link this crate pushes its state over the
//! HTTP ingress; [`HostMirror`] keeps the latest copy and serves it to the
//! scheduler through [`BalanceAuthority`] and [`SessionHost`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{BalanceAuthority, SessionHost};
use crate::domain::{Participant, ParticipantId};

#[derive(Debug, Clone)]
struct MirroredParticipant {
    display_name: Option<String>,
    balance: Option<f64>,
    online: bool,
}

/// Latest known host state, keyed by participant.
#[derive(Debug, Default)]
pub struct HostMirror {
    participants: RwLock<HashMap<ParticipantId, MirroredParticipant>>,
}

impl HostMirror {
    /// Creates an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the full state of one participant, replacing what was there.
    pub fn upsert(&self, participant: Participant, balance: f64) {
        let mut map = self.participants.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(
            participant.id,
            MirroredParticipant {
                display_name: participant.display_name,
                balance: Some(balance),
                online: participant.online,
            },
        );
    }

    /// Marks a participant active or inactive, creating it if needed.
    ///
    /// A `balance` of `None` keeps the previously mirrored balance; a
    /// participant first seen this way has no balance until the host
    /// reports one.
    pub fn set_presence(
        &self,
        id: ParticipantId,
        display_name: &str,
        online: bool,
        balance: Option<f64>,
    ) {
        let mut map = self.participants.write().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(id).or_insert(MirroredParticipant {
            display_name: None,
            balance: None,
            online,
        });
        entry.display_name = Some(display_name.to_string());
        entry.online = online;
        if let Some(balance) = balance {
            entry.balance = Some(balance);
        }
    }

    /// Number of mirrored participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing has been mirrored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, only_online: bool) -> Vec<Participant> {
        let map = self.participants.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Participant> = map
            .iter()
            .filter(|(_, p)| !only_online || p.online)
            .map(|(id, p)| Participant {
                id: *id,
                display_name: p.display_name.clone(),
                online: p.online,
            })
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }
}

impl BalanceAuthority for HostMirror {
    fn balance(&self, participant: &ParticipantId) -> Option<f64> {
        self.participants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(participant)
            .and_then(|p| p.balance)
    }
}

impl SessionHost for HostMirror {
    fn active_participants(&self) -> Vec<Participant> {
        self.collect(true)
    }

    fn all_participants(&self) -> Vec<Participant> {
        self.collect(false)
    }
}
