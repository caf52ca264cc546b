//! Latest-value usage snapshots.
//!
//! Snapshots are the mutable read-side counterpart of the immutable
//! event log: each key holds only the most recent observation, updated
//! in place by the accountant's ingest handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{InstanceId, SourceId, Username};

/// Latest aggregate usage observed for one allocation source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSnapshot {
    /// Allocation source the snapshot describes.
    pub source_id: SourceId,
    /// Total compute hours consumed so far.
    pub compute_used: f64,
    /// Aggregate burn rate across the source.
    pub global_burn_rate: f64,
    /// When this value was stored.
    pub updated_at: DateTime<Utc>,
}

/// Latest usage observed for one user on one allocation source.
///
/// Keyed by `(source_id, username)`: the same user may hold usage on
/// several sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSnapshot {
    /// Allocation source the usage counts against.
    pub source_id: SourceId,
    /// User the snapshot describes.
    pub username: Username,
    /// Compute hours this user has consumed on this source.
    pub compute_used: f64,
    /// Burn rate for this user on this source.
    pub burn_rate: f64,
    /// When this value was stored.
    pub updated_at: DateTime<Utc>,
}

/// Latest charging assignment observed for one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    /// Instance whose assignment this is.
    pub instance_id: InstanceId,
    /// Allocation source the instance charges against.
    pub source_id: SourceId,
    /// When this value was stored.
    pub updated_at: DateTime<Utc>,
}
