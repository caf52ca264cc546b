//! Keyed latest-value storage for usage snapshots.
//!
//! [`SnapshotStore`] holds the three snapshot kinds behind their natural
//! keys. Writes are last-write-wins upserts; the accountant reads the
//! previous source snapshot before overwriting it to detect threshold
//! crossings.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::ids::{InstanceId, SourceId, Username};
use super::snapshot::{InstanceSnapshot, SourceSnapshot, UserSnapshot};

/// Concurrent store of the latest snapshot per key.
///
/// # Concurrency
///
/// Each snapshot kind sits behind its own `RwLock<HashMap<..>>`. A
/// completed upsert is visible to every later read. Ordering between
/// competing upserts for the same key is the caller's concern.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    sources: RwLock<HashMap<SourceId, SourceSnapshot>>,
    users: RwLock<HashMap<(SourceId, Username), UserSnapshot>>,
    instances: RwLock<HashMap<InstanceId, InstanceSnapshot>>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the latest aggregate snapshot for a source, returning the
    /// stored value.
    ///
    /// Last write wins. A `compute_used` lower than the previous value is
    /// stored as-is but logged, since the producer maintains a counter
    /// that only grows.
    pub async fn upsert_source(
        &self,
        source_id: &SourceId,
        compute_used: f64,
        global_burn_rate: f64,
    ) -> SourceSnapshot {
        let snapshot = SourceSnapshot {
            source_id: source_id.clone(),
            compute_used,
            global_burn_rate,
            updated_at: Utc::now(),
        };
        let mut sources = self.sources.write().await;
        if let Some(previous) = sources.get(source_id)
            && previous.compute_used > compute_used
        {
            tracing::warn!(
                %source_id,
                previous = previous.compute_used,
                current = compute_used,
                "compute_used regressed; storing anyway"
            );
        }
        sources.insert(source_id.clone(), snapshot.clone());
        snapshot
    }

    /// Returns the latest aggregate snapshot for a source, if any.
    pub async fn source(&self, source_id: &SourceId) -> Option<SourceSnapshot> {
        self.sources.read().await.get(source_id).cloned()
    }

    /// Returns all aggregate snapshots, ordered by source id.
    pub async fn all_sources(&self) -> Vec<SourceSnapshot> {
        let sources = self.sources.read().await;
        let mut all: Vec<SourceSnapshot> = sources.values().cloned().collect();
        all.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        all
    }

    /// Stores the latest per-user snapshot, returning the stored value.
    pub async fn upsert_user(
        &self,
        source_id: &SourceId,
        username: &Username,
        compute_used: f64,
        burn_rate: f64,
    ) -> UserSnapshot {
        let snapshot = UserSnapshot {
            source_id: source_id.clone(),
            username: username.clone(),
            compute_used,
            burn_rate,
            updated_at: Utc::now(),
        };
        self.users
            .write()
            .await
            .insert((source_id.clone(), username.clone()), snapshot.clone());
        snapshot
    }

    /// Returns the latest snapshot for one user on one source, if any.
    pub async fn user(&self, source_id: &SourceId, username: &Username) -> Option<UserSnapshot> {
        self.users
            .read()
            .await
            .get(&(source_id.clone(), username.clone()))
            .cloned()
    }

    /// Returns all user snapshots for a source, ordered by username.
    pub async fn users_for_source(&self, source_id: &SourceId) -> Vec<UserSnapshot> {
        let users = self.users.read().await;
        let mut matching: Vec<UserSnapshot> = users
            .values()
            .filter(|s| &s.source_id == source_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.username.cmp(&b.username));
        matching
    }

    /// Stores the latest charging assignment for an instance, returning
    /// the stored value. Reassignment overwrites in place.
    pub async fn upsert_instance(
        &self,
        instance_id: &InstanceId,
        source_id: &SourceId,
    ) -> InstanceSnapshot {
        let snapshot = InstanceSnapshot {
            instance_id: instance_id.clone(),
            source_id: source_id.clone(),
            updated_at: Utc::now(),
        };
        self.instances
            .write()
            .await
            .insert(instance_id.clone(), snapshot.clone());
        snapshot
    }

    /// Returns the latest assignment for an instance, if any.
    pub async fn instance(&self, instance_id: &InstanceId) -> Option<InstanceSnapshot> {
        self.instances.read().await.get(instance_id).cloned()
    }

    /// Returns all instance assignments, ordered by instance id.
    pub async fn all_instances(&self) -> Vec<InstanceSnapshot> {
        let instances = self.instances.read().await;
        let mut all: Vec<InstanceSnapshot> = instances.values().cloned().collect();
        all.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        all
    }

    /// Reloads aggregate snapshots from the archive at startup.
    pub async fn restore_sources(&self, snapshots: Vec<SourceSnapshot>) {
        let mut sources = self.sources.write().await;
        sources.clear();
        for snapshot in snapshots {
            sources.insert(snapshot.source_id.clone(), snapshot);
        }
    }

    /// Returns the number of aggregate snapshots held.
    pub async fn source_count(&self) -> usize {
        self.sources.read().await.len()
    }
}
