//! Service layer: the sync scheduler.

pub mod sync_service;

pub use sync_service::{ReconcileReport, SyncService, SyncStatus};
