//! allocation-ledger server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints,
//! restores state from the archive, and spawns the background loops
//! (event writer, snapshot dump, retention sweep, periodic reconciler).

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use allocation_ledger::api;
use allocation_ledger::app_state::AppState;
use allocation_ledger::authority::{AllocationAuthority, HttpAuthority};
use allocation_ledger::config::LedgerConfig;
use allocation_ledger::domain::{
    EventBus, EventLog, MaintenanceCalendar, SnapshotStore, SourceDirectory,
};
use allocation_ledger::persistence::{PostgresArchive, tasks};
use allocation_ledger::service::{
    AllocationAccountant, LoggedEnforcement, LoggedNotifier, ReconcileService,
};
use allocation_ledger::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Arc::new(LedgerConfig::from_env()?);
    tracing::info!(addr = %config.listen_addr, "starting allocation-ledger");

    // Build domain layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let log = Arc::new(EventLog::new(event_bus.clone()));
    let directory = Arc::new(SourceDirectory::new());
    let snapshots = Arc::new(SnapshotStore::new());
    let calendar = Arc::new(MaintenanceCalendar::new());

    // Restore from the archive, then start the persistence loops
    if config.persistence_enabled {
        let archive = PostgresArchive::connect(&config).await?;

        let restored = archive.load_event_records().await?;
        if !restored.is_empty() {
            tracing::info!(events = restored.len(), "restored event log from archive");
        }
        log.restore(restored).await;

        let stored = archive.load_latest_snapshots().await?;
        if !stored.is_empty() {
            tracing::info!(
                snapshots = stored.len(),
                "restored source snapshots from archive"
            );
        }
        snapshots
            .restore_sources(stored.into_iter().map(|s| s.into_snapshot()).collect())
            .await;

        tokio::spawn(tasks::run_event_writer(archive.clone(), event_bus.clone()));
        if config.snapshot_interval_secs > 0 {
            tokio::spawn(tasks::run_snapshot_dump(
                archive.clone(),
                Arc::clone(&snapshots),
                Duration::from_secs(config.snapshot_interval_secs),
            ));
        }
        if config.cleanup_after_days > 0 {
            tokio::spawn(tasks::run_cleanup(archive, config.cleanup_after_days));
        }
    }

    // Build service layer
    let accountant = Arc::new(AllocationAccountant::standard(
        Arc::clone(&log),
        Arc::clone(&directory),
        Arc::clone(&snapshots),
        config.warning_thresholds.clone(),
        Arc::new(LoggedEnforcement),
        Arc::new(LoggedNotifier),
        config.usage_notices_enabled,
    ));

    let authority: Option<Arc<dyn AllocationAuthority>> = match config.authority_api_url.as_deref()
    {
        Some(url) => Some(Arc::new(HttpAuthority::new(
            url,
            config.authority_resource_name.clone(),
            Duration::from_secs(config.authority_timeout_secs),
        )?)),
        None => {
            tracing::info!("no allocation authority configured; reconciliation is manual-only");
            None
        }
    };
    let authority_configured = authority.is_some();

    let reconciler = Arc::new(ReconcileService::new(
        authority,
        Arc::clone(&directory),
        Arc::clone(&calendar),
    ));
    if authority_configured && config.reconcile_interval_secs > 0 {
        tokio::spawn(Arc::clone(&reconciler).run_periodic(Duration::from_secs(
            config.reconcile_interval_secs,
        )));
    }

    // Build application state
    let app_state = AppState {
        accountant,
        log,
        snapshots,
        directory,
        calendar,
        reconciler,
        event_bus,
        config: Arc::clone(&config),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
