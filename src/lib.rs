//! # vault-sync
//!
//! Keeps a MySQL balance ledger synchronized with the live, authoritative
//! balances of a multi-user session host.
//!
//! The host stays the source of truth; this crate decides when to copy
//! balances into storage (on a timer, on join/leave, once in bulk at
//! startup) and performs the writes off the host's execution path over a
//! single lock-guarded connection.
//!
//! ## Architecture
//!
//! ```text
//! Session host
//!     │  PUT /participants, POST /events
//!     ├── HTTP ingress (api/)
//!     │
//!     ├── HostMirror (host/)          ── BalanceAuthority + SessionHost
//!     ├── EventBus (domain/)
//!     │
//!     ├── SyncService (service/)      ── periodic / events / reconciliation
//!     ├── KnownParticipants (domain/)
//!     │
//!     ├── BalanceStore (persistence/)
//!     └── ConnectionManager ── MySQL
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod host;
pub mod persistence;
pub mod service;
