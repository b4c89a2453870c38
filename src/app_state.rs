//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::host::HostMirror;
use crate::service::SyncService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Scheduler, store and registry.
    pub sync_service: Arc<SyncService>,
    /// Host state pushed over the ingress.
    pub mirror: Arc<HostMirror>,
    /// Bus the ingress publishes participant events on.
    pub event_bus: EventBus,
}
