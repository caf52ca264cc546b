//! The accounting decision engine.
//!
//! [`AllocationAccountant`] owns the ingest path: it serializes work per
//! allocation source, appends the incoming event to the log, then walks
//! an explicit [`DispatchTable`] mapping event names to ordered handler
//! lists. Handlers append derived events through the same log and return
//! them; the accountant fans those out from a FIFO queue inside the same
//! critical section, so one delivery and all of its consequences are
//! atomic with respect to other deliveries for the same source.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::event::{EventPayload, EventRecord};
use crate::domain::{
    EventLog, EventName, SnapshotStore, SourceDirectory, SourceId, ThresholdSchedule,
};

use super::gateways::{EnforcementGateway, NotificationGateway};
use super::handlers::{
    InstanceIngest, NoticeDispatch, OverageWatch, SnapshotIngest, ThresholdWatch,
    UserSnapshotIngest,
};

/// One reaction to one event name.
///
/// Handlers are pure functions of the event and the stores they were
/// constructed with, plus idempotency-gated side effects. They must be
/// safe to re-run on a re-delivered event. Returned records are derived
/// events the handler appended; the accountant dispatches them next.
#[async_trait]
pub trait EventHandler: Send + Sync + std::fmt::Debug {
    /// Short name used in log records.
    fn name(&self) -> &'static str;

    /// Reacts to `event`, returning any derived events appended.
    async fn handle(&self, event: &EventRecord) -> Vec<Arc<EventRecord>>;
}

/// Explicit mapping from event name to an ordered list of handlers.
///
/// Registration order is execution order. For
/// `allocation_source_snapshot` the watchers run before the ingest
/// handler so they observe the pre-update snapshot.
#[derive(Debug, Default)]
pub struct DispatchTable {
    routes: HashMap<EventName, Vec<Arc<dyn EventHandler>>>,
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the route for `name`.
    pub fn register(&mut self, name: EventName, handler: Arc<dyn EventHandler>) {
        self.routes.entry(name).or_default().push(handler);
    }

    /// Returns the handlers registered for `name`, in order.
    #[must_use]
    pub fn handlers_for(&self, name: EventName) -> &[Arc<dyn EventHandler>] {
        self.routes.get(&name).map_or(&[], Vec::as_slice)
    }
}

/// The decision engine: ingest, dispatch, fan out.
#[derive(Debug)]
pub struct AllocationAccountant {
    log: Arc<EventLog>,
    table: DispatchTable,
    source_locks: Mutex<HashMap<SourceId, Arc<Mutex<()>>>>,
}

impl AllocationAccountant {
    /// Creates an accountant over `log` with a custom dispatch table.
    #[must_use]
    pub fn new(log: Arc<EventLog>, table: DispatchTable) -> Self {
        Self {
            log,
            table,
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wires the standard handler set.
    ///
    /// `allocation_source_snapshot` routes to threshold watch, overage
    /// watch, then snapshot ingest; the derived
    /// `allocation_source_threshold_met` routes to notice dispatch;
    /// `allocation_source_threshold_enforced` has no reaction (the record
    /// itself is the enforcement guard).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn standard(
        log: Arc<EventLog>,
        directory: Arc<SourceDirectory>,
        snapshots: Arc<SnapshotStore>,
        schedule: ThresholdSchedule,
        enforcement: Arc<dyn EnforcementGateway>,
        notifier: Arc<dyn NotificationGateway>,
        notices_enabled: bool,
    ) -> Self {
        let mut table = DispatchTable::new();
        table.register(
            EventName::SourceSnapshot,
            Arc::new(ThresholdWatch::new(
                Arc::clone(&directory),
                Arc::clone(&snapshots),
                Arc::clone(&log),
                schedule,
            )),
        );
        table.register(
            EventName::SourceSnapshot,
            Arc::new(OverageWatch::new(
                Arc::clone(&directory),
                Arc::clone(&log),
                enforcement,
            )),
        );
        table.register(
            EventName::SourceSnapshot,
            Arc::new(SnapshotIngest::new(
                Arc::clone(&directory),
                Arc::clone(&snapshots),
            )),
        );
        table.register(
            EventName::ThresholdMet,
            Arc::new(NoticeDispatch::new(
                Arc::clone(&directory),
                notifier,
                notices_enabled,
            )),
        );
        table.register(
            EventName::UserSnapshotChanged,
            Arc::new(UserSnapshotIngest::new(
                Arc::clone(&directory),
                Arc::clone(&snapshots),
            )),
        );
        table.register(
            EventName::InstanceSourceChanged,
            Arc::new(InstanceIngest::new(directory, snapshots)),
        );
        Self::new(log, table)
    }

    /// Returns the log this accountant appends to.
    #[must_use]
    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Records one delivered event and runs every consequence.
    ///
    /// Holds the per-source lock for the whole handler sequence,
    /// including handlers of derived events, so concurrent deliveries
    /// for the same source cannot interleave their read-then-write
    /// percentage computations or double-pass an idempotency gate.
    /// Deliveries for different sources proceed concurrently.
    pub async fn ingest(&self, entity_id: String, payload: EventPayload) -> Arc<EventRecord> {
        let subject = payload.subject_source_id().clone();
        let lock = self.source_lock(&subject).await;
        let _guard = lock.lock().await;

        let record = self.log.append(entity_id, payload).await;
        tracing::info!(
            name = %record.name,
            entity_id = %record.entity_id,
            sequence = record.sequence,
            "event recorded"
        );

        let mut queue = VecDeque::from([Arc::clone(&record)]);
        while let Some(event) = queue.pop_front() {
            for handler in self.table.handlers_for(event.name) {
                tracing::debug!(handler = handler.name(), name = %event.name, "dispatching");
                let derived = handler.handle(&event).await;
                queue.extend(derived);
            }
        }
        record
    }

    async fn source_lock(&self, source_id: &SourceId) -> Arc<Mutex<()>> {
        let mut locks = self.source_locks.lock().await;
        let entry = locks
            .entry(source_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry)
    }
}
