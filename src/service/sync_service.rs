//! Sync scheduler: decides when balances are written to storage.
//!
//! [`SyncService`] combines three independent policies over one
//! [`BalanceStore`]:
//!
//! - a periodic scan of active participants,
//! - writes triggered by join/leave [`ParticipantEvent`]s (event-driven
//!   strategy and the first-seen-participant fast path),
//! - a one-shot bulk reconciliation covering inactive participants.
//!
//! All of them run on tokio tasks; nothing here is meant to be awaited
//! from the host's own execution context except [`SyncService::shutdown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{SyncMethod, SyncSettings};
use crate::domain::{EventBus, KnownParticipants, ParticipantEvent, ParticipantId};
use crate::host::{BalanceAuthority, SessionHost};
use crate::persistence::BalanceStore;

/// Progress is logged after this many inactive participants.
const RECONCILE_PROGRESS_EVERY: usize = 100;

/// Counts from one bulk reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Active participants written.
    pub active: usize,
    /// Inactive participants written.
    pub inactive: usize,
    /// Participants not written (no live balance or store failure).
    pub failed: usize,
    /// `true` if shutdown interrupted the pass.
    pub interrupted: bool,
}

/// Snapshot of scheduler and storage health.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Backend name (`mysql` or `memory`).
    pub store: &'static str,
    /// Whether the store currently holds a connection.
    pub database_connected: bool,
    /// Whether the known-participant registry was loaded from storage.
    pub registry_seeded: bool,
    /// Size of the known-participant registry.
    pub known_participants: usize,
    /// Active routine strategy.
    pub sync_method: SyncMethod,
}

/// Orchestrates balance writes for the session host.
#[derive(Debug)]
pub struct SyncService {
    store: BalanceStore,
    authority: Arc<dyn BalanceAuthority>,
    host: Arc<dyn SessionHost>,
    known: Arc<KnownParticipants>,
    settings: SyncSettings,
    registry_seeded: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncService {
    /// Creates a scheduler. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(
        store: BalanceStore,
        authority: Arc<dyn BalanceAuthority>,
        host: Arc<dyn SessionHost>,
        known: Arc<KnownParticipants>,
        settings: SyncSettings,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            authority,
            host,
            known,
            settings,
            registry_seeded: AtomicBool::new(false),
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &BalanceStore {
        &self.store
    }

    /// Returns the known-participant registry.
    #[must_use]
    pub fn known(&self) -> &Arc<KnownParticipants> {
        &self.known
    }

    /// Returns the scheduler settings.
    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Loads every stored identifier into the registry.
    ///
    /// On failure the registry stays as it is (empty at startup) and every
    /// participant will look new; this is reported, not fatal.
    pub async fn seed_known_participants(&self) -> bool {
        match self.store.try_list_all_identifiers().await {
            Ok(ids) => {
                let count = ids.len();
                self.known.seed(ids).await;
                self.registry_seeded.store(true, Ordering::Release);
                tracing::info!(count, "loaded known participants from database");
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "could not load known participants; every participant will be treated as new"
                );
                false
            }
        }
    }

    /// Reads the live balance of one participant and writes it.
    ///
    /// Returns the balance that was written. `None` means nothing was
    /// written: either the host has no balance for the participant, so
    /// the stored value is left alone, or the store rejected the write.
    pub async fn sync_participant(&self, id: ParticipantId, display_name: &str) -> Option<f64> {
        let Some(balance) = self.authority.balance(&id) else {
            tracing::warn!(%id, display_name, "no live balance for participant, skipping write");
            return None;
        };
        if !self.store.upsert_balance(id, display_name, balance).await {
            return None;
        }
        if self.settings.verbose {
            tracing::info!(%id, display_name, balance, "synchronized participant");
        } else {
            tracing::debug!(%id, display_name, balance, "synchronized participant");
        }
        Some(balance)
    }

    /// One periodic cycle: writes every active participant.
    ///
    /// Never touches inactive participants or the registry. Returns the
    /// number of successful writes.
    pub async fn sync_active_participants(&self) -> usize {
        tracing::info!("starting timed synchronization");
        let mut written = 0usize;
        for participant in self.host.active_participants() {
            if self
                .sync_participant(participant.id, participant.name_or_unknown())
                .await
                .is_some()
            {
                written += 1;
            }
        }
        if self.settings.verbose {
            tracing::info!(count = written, "synchronized active participants");
        }
        tracing::info!("timed synchronization completed");
        written
    }

    /// Applies the join/leave policy to one event.
    ///
    /// Returns `true` if a write was attempted.
    pub async fn handle_event(&self, event: &ParticipantEvent) -> bool {
        let id = event.participant_id();
        let name = event.display_name();
        match event {
            ParticipantEvent::ParticipantJoined { .. } => {
                if self.settings.sync_new_immediately && self.known.insert(id).await {
                    match self.sync_participant(id, name).await {
                        Some(balance) => tracing::info!(
                            %id,
                            display_name = name,
                            balance,
                            "new participant detected and synchronized"
                        ),
                        None => tracing::info!(
                            %id,
                            display_name = name,
                            "new participant detected, balance not written"
                        ),
                    }
                    return true;
                }
                if self.settings.method == SyncMethod::Events {
                    self.sync_participant(id, name).await;
                    self.known.insert(id).await;
                    return true;
                }
                false
            }
            ParticipantEvent::ParticipantLeft { .. } => {
                if self.settings.method == SyncMethod::Events {
                    self.sync_participant(id, name).await;
                    return true;
                }
                false
            }
        }
    }

    /// Writes every participant the host knows about, active ones first.
    ///
    /// Each written participant is added to the registry. Stops between
    /// participants once shutdown has been requested.
    pub async fn reconcile_all(&self) -> ReconcileReport {
        tracing::info!("starting full synchronization of all participants");
        let mut report = ReconcileReport::default();

        for participant in self.host.active_participants() {
            if self.shutdown_requested() {
                report.interrupted = true;
                break;
            }
            if self
                .sync_participant(participant.id, participant.name_or_unknown())
                .await
                .is_some()
            {
                report.active += 1;
            } else {
                report.failed += 1;
            }
            self.known.insert(participant.id).await;
        }

        for participant in self.host.all_participants() {
            if report.interrupted || self.shutdown_requested() {
                report.interrupted = true;
                break;
            }
            if participant.online {
                continue;
            }
            if self
                .sync_participant(participant.id, participant.name_or_unknown())
                .await
                .is_some()
            {
                report.inactive += 1;
            } else {
                report.failed += 1;
            }
            self.known.insert(participant.id).await;

            if report.inactive > 0 && report.inactive % RECONCILE_PROGRESS_EVERY == 0 {
                tracing::info!(count = report.inactive, "synchronized inactive participants so far");
            }
        }

        tracing::info!(
            active = report.active,
            inactive = report.inactive,
            failed = report.failed,
            interrupted = report.interrupted,
            "full synchronization completed"
        );
        report
    }

    /// Spawns the background workers the settings ask for.
    ///
    /// The event loop always runs so first-seen participants are caught
    /// under either strategy. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>, bus: &EventBus) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);

        let events = bus.subscribe();
        let shutdown = self.shutdown_tx.subscribe();
        workers.push(tokio::spawn(Arc::clone(self).run_event_loop(events, shutdown)));

        match self.settings.method {
            SyncMethod::Periodic => {
                let shutdown = self.shutdown_tx.subscribe();
                workers.push(tokio::spawn(Arc::clone(self).run_periodic(shutdown)));
                tracing::info!(
                    interval_secs = self.settings.interval.as_secs(),
                    "using timed synchronization"
                );
            }
            SyncMethod::Events => {
                tracing::info!("using event-based synchronization on participant join/leave");
            }
        }

        if self.settings.full_sync_on_startup {
            tracing::info!("full sync on startup enabled");
            let service = Arc::clone(self);
            workers.push(tokio::spawn(async move {
                service.reconcile_all().await;
            }));
        }
    }

    /// Stops the workers, writes active participants one last time and
    /// closes the store.
    ///
    /// An in-flight periodic cycle is allowed to finish; no new one starts.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "sync worker ended abnormally");
            }
        }

        tracing::info!("performing final synchronization before shutdown");
        let mut written = 0usize;
        for participant in self.host.active_participants() {
            if self
                .sync_participant(participant.id, participant.name_or_unknown())
                .await
                .is_some()
            {
                written += 1;
            }
        }
        tracing::info!(count = written, "final synchronization completed");

        self.store.close().await;
    }

    /// Current scheduler and storage health.
    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            store: self.store.kind(),
            database_connected: self.store.is_connected(),
            registry_seeded: self.registry_seeded.load(Ordering::Acquire),
            known_participants: self.known.len().await,
            sync_method: self.settings.method,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    async fn run_periodic(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let first = Instant::now() + self.settings.initial_delay;
        let mut ticker = tokio::time::interval_at(first, self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sync_active_participants().await;
                }
            }
        }
        tracing::debug!("periodic sync stopped");
    }

    async fn run_event_loop(
        self: Arc<Self>,
        mut events: broadcast::Receiver<ParticipantEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        self.handle_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "sync scheduler lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        // Events published before shutdown still get their writes.
        while let Ok(event) = events.try_recv() {
            self.handle_event(&event).await;
        }
        tracing::debug!("event loop stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::Participant;
    use crate::host::HostMirror;
    use crate::persistence::{BalanceLookup, InMemoryBalanceStore};

    struct Harness {
        service: Arc<SyncService>,
        store: Arc<InMemoryBalanceStore>,
        mirror: Arc<HostMirror>,
    }

    fn harness(settings: SyncSettings) -> Harness {
        let store = Arc::new(InMemoryBalanceStore::new());
        let mirror = Arc::new(HostMirror::new());
        let service = Arc::new(SyncService::new(
            BalanceStore::from(Arc::clone(&store)),
            Arc::clone(&mirror) as Arc<dyn BalanceAuthority>,
            Arc::clone(&mirror) as Arc<dyn SessionHost>,
            Arc::new(KnownParticipants::new()),
            settings,
        ));
        Harness {
            service,
            store,
            mirror,
        }
    }

    fn events_settings() -> SyncSettings {
        SyncSettings {
            method: SyncMethod::Events,
            ..SyncSettings::default()
        }
    }

    fn online(h: &Harness, name: &str, balance: f64) -> ParticipantId {
        let id = ParticipantId::new_random();
        h.mirror.upsert(Participant::online(id, name), balance);
        id
    }

    #[tokio::test]
    async fn first_join_syncs_once_and_registers() {
        let h = harness(SyncSettings::default());
        let id = online(&h, "Alice", 42.5);

        assert!(h.service.handle_event(&ParticipantEvent::joined(id, "Alice")).await);
        assert_eq!(h.store.write_count(), 1);
        assert!(h.service.known().contains(&id).await);

        // periodic strategy: a returning participant is left to the timer
        assert!(!h.service.handle_event(&ParticipantEvent::joined(id, "Alice")).await);
        assert_eq!(h.store.write_count(), 1);
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(42.5));
    }

    #[tokio::test]
    async fn seeded_participant_is_not_new() {
        let h = harness(SyncSettings::default());
        let id = online(&h, "Bob", 7.0);
        h.store.upsert_balance(id, "Bob", 1.0).await;

        assert!(h.service.seed_known_participants().await);
        assert!(!h.service.handle_event(&ParticipantEvent::joined(id, "Bob")).await);
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(1.0));
        assert!(h.service.status().await.registry_seeded);
    }

    #[tokio::test]
    async fn failed_seed_degrades_to_empty_registry() {
        let h = harness(SyncSettings::default());
        h.store.set_online(false);

        assert!(!h.service.seed_known_participants().await);
        let status = h.service.status().await;
        assert!(!status.registry_seeded);
        assert_eq!(status.known_participants, 0);
    }

    #[tokio::test]
    async fn new_participant_path_can_be_disabled() {
        let h = harness(SyncSettings {
            sync_new_immediately: false,
            ..SyncSettings::default()
        });
        let id = online(&h, "Carol", 3.0);

        assert!(!h.service.handle_event(&ParticipantEvent::joined(id, "Carol")).await);
        assert_eq!(h.store.write_count(), 0);
        assert!(!h.service.known().contains(&id).await);
    }

    #[tokio::test]
    async fn event_strategy_writes_on_every_join_and_leave() {
        let h = harness(events_settings());
        let id = online(&h, "Dave", 10.0);

        h.service.handle_event(&ParticipantEvent::joined(id, "Dave")).await;
        assert_eq!(h.store.write_count(), 1);

        h.mirror.upsert(Participant::online(id, "Dave"), 55.0);
        h.service.handle_event(&ParticipantEvent::left(id, "Dave")).await;
        assert_eq!(h.store.write_count(), 2);
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(55.0));

        h.service.handle_event(&ParticipantEvent::joined(id, "Dave")).await;
        assert_eq!(h.store.write_count(), 3);
    }

    #[tokio::test]
    async fn leave_without_live_balance_keeps_stored_value() {
        let h = harness(events_settings());
        let id = ParticipantId::new_random();
        h.store.upsert_balance(id, "Rich", 5000.0).await;
        assert!(h.service.seed_known_participants().await);
        h.mirror.set_presence(id, "Rich", false, None);

        assert!(h.service.handle_event(&ParticipantEvent::left(id, "Rich")).await);
        assert_eq!(h.store.write_count(), 1);
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(5000.0));
    }

    #[tokio::test]
    async fn first_join_without_live_balance_registers_but_skips_write() {
        let h = harness(SyncSettings::default());
        let id = ParticipantId::new_random();
        h.store.upsert_balance(id, "Rich", 5000.0).await;
        h.mirror.set_presence(id, "Rich", true, None);

        // registry never seeded, so the participant looks new
        assert!(h.service.handle_event(&ParticipantEvent::joined(id, "Rich")).await);
        assert!(h.service.known().contains(&id).await);
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(5000.0));

        assert_eq!(h.service.sync_participant(id, "Rich").await, None);
        h.mirror.set_presence(id, "Rich", true, Some(4200.0));
        assert_eq!(h.service.sync_participant(id, "Rich").await, Some(4200.0));
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(4200.0));
    }

    #[tokio::test]
    async fn periodic_strategy_ignores_leave() {
        let h = harness(SyncSettings::default());
        let id = online(&h, "Erin", 1.0);
        assert!(!h.service.handle_event(&ParticipantEvent::left(id, "Erin")).await);
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn periodic_cycle_skips_inactive() {
        let h = harness(SyncSettings::default());
        online(&h, "A", 1.0);
        online(&h, "B", 2.0);
        let away = ParticipantId::new_random();
        h.mirror.upsert(Participant::offline(away, Some("Away".to_string())), 9.0);

        assert_eq!(h.service.sync_active_participants().await, 2);
        assert_eq!(h.store.read_balance(away).await, BalanceLookup::NotFound);
        assert!(h.service.known().is_empty().await);
    }

    #[tokio::test]
    async fn reconciliation_covers_active_and_inactive() {
        let h = harness(SyncSettings::default());
        let mut expected = Vec::new();
        for (name, balance) in [("A", 10.0), ("B", 20.0), ("C", 30.0)] {
            expected.push((online(&h, name, balance), balance));
        }
        for balance in [5.0, 15.0] {
            let id = ParticipantId::new_random();
            h.mirror.upsert(Participant::offline(id, None), balance);
            expected.push((id, balance));
        }

        let report = h.service.reconcile_all().await;
        assert_eq!(report.active, 3);
        assert_eq!(report.inactive, 2);
        assert!(!report.interrupted);

        let Ok(listed) = h.store.try_list_identifiers().await else {
            panic!("listing failed");
        };
        assert_eq!(listed.len(), 5);
        for (id, balance) in expected {
            assert!(listed.contains(&id));
            assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(balance));
            assert!(h.service.known().contains(&id).await);
        }
    }

    #[tokio::test]
    async fn reconciliation_names_nameless_participants_unknown() {
        let h = harness(SyncSettings::default());
        let id = ParticipantId::new_random();
        h.mirror.upsert(Participant::offline(id, None), 1.0);

        h.service.reconcile_all().await;
        let Some(record) = h.store.read_record(id).await else {
            panic!("record missing");
        };
        assert_eq!(record.display_name, "Unknown");
    }

    #[tokio::test]
    async fn store_outage_never_fails_events() {
        let h = harness(events_settings());
        let id = online(&h, "Frank", 4.0);
        h.store.set_online(false);

        assert!(h.service.handle_event(&ParticipantEvent::joined(id, "Frank")).await);
        assert_eq!(h.store.write_count(), 0);

        h.store.set_online(true);
        h.service.handle_event(&ParticipantEvent::left(id, "Frank")).await;
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(4.0));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_worker_ticks_until_shutdown() {
        let h = harness(SyncSettings {
            interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(5),
            sync_new_immediately: false,
            ..SyncSettings::default()
        });
        online(&h, "A", 1.0);
        online(&h, "B", 2.0);
        let bus = EventBus::new(16);
        h.service.start(&bus);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.store.write_count(), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.store.write_count(), 4);

        h.service.shutdown().await;
        // final pass over both active participants
        assert_eq!(h.store.write_count(), 6);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(h.store.write_count(), 6);
    }

    #[tokio::test]
    async fn events_on_bus_reach_the_store() {
        let h = harness(events_settings());
        let id = online(&h, "Gina", 12.0);
        let bus = EventBus::new(16);
        h.service.start(&bus);

        bus.publish(ParticipantEvent::joined(id, "Gina"));
        bus.publish(ParticipantEvent::left(id, "Gina"));
        h.service.shutdown().await;

        // join + leave from the bus, then the final pass
        assert_eq!(h.store.write_count(), 3);
        assert_eq!(h.store.read_balance(id).await, BalanceLookup::Found(12.0));
    }

    #[tokio::test]
    async fn startup_reconciliation_runs_in_background() {
        let h = harness(SyncSettings {
            method: SyncMethod::Events,
            full_sync_on_startup: true,
            ..SyncSettings::default()
        });
        let id = ParticipantId::new_random();
        h.mirror.upsert(Participant::offline(id, Some("Old".to_string())), 99.0);

        let bus = EventBus::new(16);
        h.service.start(&bus);

        let mut found = BalanceLookup::NotFound;
        for _ in 0..100 {
            found = h.store.read_balance(id).await;
            if found != BalanceLookup::NotFound {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(found, BalanceLookup::Found(99.0));
        assert!(h.service.known().contains(&id).await);

        h.service.shutdown().await;
    }
}
