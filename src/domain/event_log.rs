//! Append-only store of immutable accounting events.
//!
//! [`EventLog`] is the system of record for idempotency decisions: the
//! accountant asks "has this event been recorded" before firing any side
//! effect. Appends are immediately visible to subsequent reads, and every
//! append publishes the record on the [`EventBus`].

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::EventBus;
use super::event::{EventName, EventPayload, EventRecord};

/// Append-only in-memory event store with strong read-after-write.
///
/// # Concurrency
///
/// All state lives behind one `RwLock`; a completed `append` is visible
/// to every later query. Per-source ordering of appends is the caller's
/// concern (the accountant serializes per source).
#[derive(Debug)]
pub struct EventLog {
    inner: RwLock<LogInner>,
    bus: EventBus,
}

#[derive(Debug, Default)]
struct LogInner {
    events: Vec<Arc<EventRecord>>,
    next_sequence: u64,
}

impl EventLog {
    /// Creates an empty log publishing appends on `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            inner: RwLock::new(LogInner::default()),
            bus,
        }
    }

    /// Appends a new event, assigning its sequence and timestamp.
    ///
    /// The record is stored before it is published, so a subscriber that
    /// reacts to the broadcast will find it in the log.
    pub async fn append(
        &self,
        entity_id: impl Into<String>,
        payload: EventPayload,
    ) -> Arc<EventRecord> {
        let record = {
            let mut inner = self.inner.write().await;
            let record = Arc::new(EventRecord {
                sequence: inner.next_sequence,
                name: payload.name(),
                entity_id: entity_id.into(),
                payload,
                recorded_at: Utc::now(),
            });
            inner.next_sequence += 1;
            inner.events.push(Arc::clone(&record));
            record
        };
        self.bus.publish(Arc::clone(&record));
        record
    }

    /// Returns `true` if any event with this name exists for the entity.
    pub async fn exists(&self, name: EventName, entity_id: &str) -> bool {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .any(|r| r.name == name && r.entity_id == entity_id)
    }

    /// Returns `true` if any event with this name for the entity has a
    /// payload matching `predicate`.
    pub async fn exists_matching<F>(&self, name: EventName, entity_id: &str, predicate: F) -> bool
    where
        F: Fn(&EventPayload) -> bool,
    {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .any(|r| r.name == name && r.entity_id == entity_id && predicate(&r.payload))
    }

    /// Returns the most recent event with this name, optionally scoped to
    /// one entity.
    pub async fn latest(
        &self,
        name: EventName,
        entity_id: Option<&str>,
    ) -> Option<Arc<EventRecord>> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .rev()
            .find(|r| r.name == name && entity_id.is_none_or(|id| r.entity_id == id))
            .cloned()
    }

    /// Returns up to `limit` events newest-first, optionally filtered by
    /// name and entity.
    pub async fn recent(
        &self,
        limit: usize,
        name: Option<EventName>,
        entity_id: Option<&str>,
    ) -> Vec<Arc<EventRecord>> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .rev()
            .filter(|r| name.is_none_or(|n| r.name == n))
            .filter(|r| entity_id.is_none_or(|id| r.entity_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Replaces the log contents with archived records at startup.
    ///
    /// Does not publish anything: restored events already had their side
    /// effects when first recorded. The sequence counter resumes after
    /// the highest restored sequence.
    pub async fn restore(&self, records: Vec<EventRecord>) {
        let mut events: Vec<Arc<EventRecord>> = records.into_iter().map(Arc::new).collect();
        events.sort_by_key(|r| r.sequence);
        let mut inner = self.inner.write().await;
        inner.next_sequence = events.last().map_or(0, |r| r.sequence + 1);
        inner.events = events;
    }

    /// Returns the number of events in the log.
    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    /// Returns `true` if the log holds no events.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.events.is_empty()
    }
}
