//! vault-sync entry point.
//!
//! Connects to MySQL, prepares the balance table, loads the known
//! participants, starts the sync scheduler and serves the host ingress
//! until Ctrl+C or SIGTERM, then runs the final synchronization.

use std::sync::Arc;

use anyhow::{Context, bail};
use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use vault_sync::api;
use vault_sync::app_state::AppState;
use vault_sync::config::SyncConfig;
use vault_sync::domain::{EventBus, KnownParticipants};
use vault_sync::host::{BalanceAuthority, HostMirror, SessionHost};
use vault_sync::persistence::{
    BalanceStore, ConnectionManager, InMemoryBalanceStore, MySqlBalanceStore,
};
use vault_sync::service::SyncService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = SyncConfig::from_env().context("loading configuration")?;
    tracing::info!(
        addr = %config.listen_addr,
        persistence = config.persistence_enabled,
        sync_method = %config.sync.method,
        "starting vault-sync"
    );
    if config.sync.verbose {
        tracing::info!("verbose mode enabled - every write will be logged");
    }

    // Storage: the first connection must succeed
    let store = if config.persistence_enabled {
        let connection = Arc::new(ConnectionManager::new(config.database.clone()));
        if !connection.ensure_connected().await {
            bail!(
                "cannot connect to database at {}",
                config.database.connection_url()
            );
        }
        BalanceStore::from(MySqlBalanceStore::new(connection)?)
    } else {
        tracing::warn!("persistence disabled - balances are kept in memory only");
        BalanceStore::from(Arc::new(InMemoryBalanceStore::new()))
    };
    if !store.create_schema_if_absent().await {
        bail!("cannot create balance table {}", config.database.table);
    }

    // Domain + host boundary
    let mirror = Arc::new(HostMirror::new());
    let event_bus = EventBus::new(config.event_bus_capacity);
    let known = Arc::new(KnownParticipants::new());

    // Scheduler
    let sync_service = Arc::new(SyncService::new(
        store,
        Arc::clone(&mirror) as Arc<dyn BalanceAuthority>,
        Arc::clone(&mirror) as Arc<dyn SessionHost>,
        known,
        config.sync.clone(),
    ));
    if !sync_service.seed_known_participants().await {
        tracing::warn!("known-participant registry degraded; see /health");
    }
    sync_service.start(&event_bus);

    let app_state = AppState {
        sync_service: Arc::clone(&sync_service),
        mirror,
        event_bus,
    };

    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("shutdown signal received, stopping server");
        })
        .await
        .context("serving http")?;

    sync_service.shutdown().await;
    tracing::info!("vault-sync shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => tracing::info!("received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        tracing::info!("received Ctrl+C");
    }
}
