//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::domain::{EventBus, EventLog, MaintenanceCalendar, SnapshotStore, SourceDirectory};
use crate::service::{AllocationAccountant, ReconcileService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Ingest path for delivered events.
    pub accountant: Arc<AllocationAccountant>,
    /// Append-only event log, for audit reads.
    pub log: Arc<EventLog>,
    /// Latest-value usage snapshots.
    pub snapshots: Arc<SnapshotStore>,
    /// Registry of sources, users, memberships, and instances.
    pub directory: Arc<SourceDirectory>,
    /// Scheduled maintenance windows.
    pub calendar: Arc<MaintenanceCalendar>,
    /// Authority reconciliation, driven by `POST /reconcile` and the
    /// periodic loop.
    pub reconciler: Arc<ReconcileService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Effective configuration, served by `/config/accounting`.
    pub config: Arc<LedgerConfig>,
}
