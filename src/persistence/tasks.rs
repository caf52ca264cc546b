//! Background tasks that mirror in-memory state into the archive.
//!
//! The in-memory log and snapshot store stay authoritative at runtime;
//! these loops trail behind them. Each is spawned once from `main` when
//! persistence is enabled and runs until the process exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use super::PostgresArchive;
use crate::domain::{EventBus, SnapshotStore};

/// How often the retention sweep runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Subscribes to the bus and archives every published event.
///
/// A lagged receiver means the archive permanently misses those events;
/// the gap is logged rather than repaired.
pub async fn run_event_writer(archive: PostgresArchive, bus: EventBus) {
    let mut events = bus.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(error) = archive.save_event(&event).await {
                    tracing::warn!(sequence = event.sequence, %error, "failed to archive event");
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event writer lagged; archive is missing events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Periodically dumps the full set of source snapshots to the archive.
pub async fn run_snapshot_dump(
    archive: PostgresArchive,
    snapshots: Arc<SnapshotStore>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let current = snapshots.all_sources().await;
        if current.is_empty() {
            continue;
        }
        match archive.save_source_snapshots(&current).await {
            Ok(saved) => tracing::debug!(saved, "archived source snapshots"),
            Err(error) => tracing::warn!(%error, "failed to archive source snapshots"),
        }
    }
}

/// Hourly retention sweep deleting archive rows older than `after_days`.
pub async fn run_cleanup(archive: PostgresArchive, after_days: u64) {
    let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        ticker.tick().await;
        match archive.delete_events_before(after_days).await {
            Ok(deleted) if deleted > 0 => tracing::info!(deleted, "pruned archived events"),
            Ok(_) => {}
            Err(error) => tracing::warn!(%error, "event retention sweep failed"),
        }
        match archive.delete_snapshots_before(after_days).await {
            Ok(deleted) if deleted > 0 => tracing::info!(deleted, "pruned archived snapshots"),
            Ok(_) => {}
            Err(error) => tracing::warn!(%error, "snapshot retention sweep failed"),
        }
    }
}
