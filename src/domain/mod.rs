//! Domain layer: identifiers, events, snapshots, and registries.
//!
//! This module contains the accounting model: the fixed event vocabulary
//! and append-only [`EventLog`], the latest-value [`SnapshotStore`], the
//! [`SourceDirectory`] of definitions and relationships, the warning
//! [`ThresholdSchedule`], and the [`MaintenanceCalendar`] gating
//! background work.

pub mod directory;
pub mod event;
pub mod event_bus;
pub mod event_log;
pub mod ids;
pub mod maintenance;
pub mod records;
pub mod snapshot;
pub mod snapshot_store;
pub mod thresholds;

pub use directory::SourceDirectory;
pub use event::{
    EventName, EventPayload, EventRecord, InstanceSourcePayload, SourceSnapshotPayload,
    ThresholdEnforcedPayload, ThresholdMetPayload, UserSnapshotPayload,
};
pub use event_bus::EventBus;
pub use event_log::EventLog;
pub use ids::{InstanceId, SourceId, Username};
pub use maintenance::{MaintenanceCalendar, MaintenanceWindow};
pub use records::{AllocationSource, InstanceRecord, InstanceStatus, UserRecord};
pub use snapshot::{InstanceSnapshot, SourceSnapshot, UserSnapshot};
pub use snapshot_store::SnapshotStore;
pub use thresholds::ThresholdSchedule;
