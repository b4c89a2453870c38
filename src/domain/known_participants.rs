//! Process-local set of participants already written to storage.
//!
//! [`KnownParticipants`] answers one question for the scheduler: has this
//! identifier been persisted before? It is seeded from the balance table
//! at startup and grows as first-time participants are synchronized. It
//! is never written back; storage stays the source of truth.

use std::collections::HashSet;

use tokio::sync::RwLock;

use super::ParticipantId;

/// Concurrent set of known participant identifiers.
///
/// # Concurrency
///
/// - Lookups from many tasks proceed in parallel.
/// - [`insert`](Self::insert) is an atomic test-and-set, so two tasks
///   racing on the same identifier see exactly one `true`.
#[derive(Debug, Default)]
pub struct KnownParticipants {
    ids: RwLock<HashSet<ParticipantId>>,
}

impl KnownParticipants {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every identifier in `ids`, keeping existing entries.
    pub async fn seed(&self, ids: impl IntoIterator<Item = ParticipantId>) {
        self.ids.write().await.extend(ids);
    }

    /// Registers `id`. Returns `true` if it was not known before.
    pub async fn insert(&self, id: ParticipantId) -> bool {
        self.ids.write().await.insert(id)
    }

    /// Returns `true` if `id` has been seen.
    pub async fn contains(&self, id: &ParticipantId) -> bool {
        self.ids.read().await.contains(id)
    }

    /// Returns the number of known identifiers.
    pub async fn len(&self) -> usize {
        self.ids.read().await.len()
    }

    /// Returns `true` if no identifier is known.
    pub async fn is_empty(&self) -> bool {
        self.ids.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn insert_reports_first_sighting_only() {
        let known = KnownParticipants::new();
        let id = ParticipantId::new_random();

        assert!(known.insert(id).await);
        assert!(!known.insert(id).await);
        assert!(known.contains(&id).await);
        assert_eq!(known.len().await, 1);
    }

    #[tokio::test]
    async fn seed_extends_existing_entries() {
        let known = KnownParticipants::new();
        let first = ParticipantId::new_random();
        known.insert(first).await;

        let seeded: Vec<_> = (0..3).map(|_| ParticipantId::new_random()).collect();
        known.seed(seeded.iter().copied()).await;

        assert_eq!(known.len().await, 4);
        assert!(known.contains(&first).await);
        for id in &seeded {
            assert!(known.contains(id).await);
        }
    }

    #[tokio::test]
    async fn len_and_is_empty() {
        let known = KnownParticipants::new();
        assert!(known.is_empty().await);
        known.insert(ParticipantId::new_random()).await;
        assert!(!known.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_lose_nothing() {
        let known = Arc::new(KnownParticipants::new());
        let ids: Vec<_> = (0..200).map(|_| ParticipantId::new_random()).collect();

        let mut handles = Vec::new();
        for chunk in ids.chunks(25) {
            let known = Arc::clone(&known);
            let chunk = chunk.to_vec();
            handles.push(tokio::spawn(async move {
                for id in chunk {
                    known.insert(id).await;
                }
            }));
        }
        for handle in handles {
            let Ok(()) = handle.await else {
                panic!("insert task failed");
            };
        }

        assert_eq!(known.len().await, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_inserts_of_one_id_win_once() {
        let known = Arc::new(KnownParticipants::new());
        let id = ParticipantId::new_random();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let known = Arc::clone(&known);
            handles.push(tokio::spawn(async move { known.insert(id).await }));
        }
        let mut winners = 0;
        for handle in handles {
            let Ok(won) = handle.await else {
                panic!("insert task failed");
            };
            if won {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
