//! Reaction handlers invoked by the accountant's dispatch table.
//!
//! Each handler reacts to one event name and is a pure function of the
//! incoming event, the event log, and the snapshot store, plus
//! idempotency-gated side effects. All of them tolerate re-delivery of
//! the same event without duplicating effects, and treat unknown or
//! unconfigured sources as benign no-ops.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::event::{EventPayload, EventRecord, ThresholdEnforcedPayload, ThresholdMetPayload};
use crate::domain::{EventLog, EventName, SnapshotStore, SourceDirectory, ThresholdSchedule};

use super::accountant::EventHandler;
use super::gateways::{EnforcementGateway, NotificationGateway};

/// Keeps the latest aggregate snapshot current (`allocation_source_snapshot`).
///
/// Registered after [`ThresholdWatch`] so the watcher still sees the
/// previous value.
#[derive(Debug)]
pub struct SnapshotIngest {
    directory: Arc<SourceDirectory>,
    snapshots: Arc<SnapshotStore>,
}

impl SnapshotIngest {
    /// Creates the handler.
    #[must_use]
    pub fn new(directory: Arc<SourceDirectory>, snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            directory,
            snapshots,
        }
    }
}

#[async_trait]
impl EventHandler for SnapshotIngest {
    fn name(&self) -> &'static str {
        "snapshot_ingest"
    }

    async fn handle(&self, event: &EventRecord) -> Vec<Arc<EventRecord>> {
        let EventPayload::SourceSnapshot(payload) = &event.payload else {
            return Vec::new();
        };
        let source_id = &payload.allocation_source_id;
        let Some(source) = self.directory.source(source_id).await else {
            tracing::debug!(%source_id, "snapshot for unknown source; skipping");
            return Vec::new();
        };
        if source.budget().is_none() {
            tracing::debug!(%source_id, "source has no budget configured; skipping");
            return Vec::new();
        }
        self.snapshots
            .upsert_source(source_id, payload.compute_used, payload.global_burn_rate)
            .await;
        Vec::new()
    }
}

/// Detects warning-threshold crossings (`allocation_source_snapshot`).
///
/// Compares the previous stored percentage against the incoming one;
/// when several levels are jumped in one update only the highest fires.
/// Each `(source, threshold)` pair fires at most once over the whole
/// event history.
#[derive(Debug)]
pub struct ThresholdWatch {
    directory: Arc<SourceDirectory>,
    snapshots: Arc<SnapshotStore>,
    log: Arc<EventLog>,
    schedule: ThresholdSchedule,
}

impl ThresholdWatch {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        directory: Arc<SourceDirectory>,
        snapshots: Arc<SnapshotStore>,
        log: Arc<EventLog>,
        schedule: ThresholdSchedule,
    ) -> Self {
        Self {
            directory,
            snapshots,
            log,
            schedule,
        }
    }
}

#[async_trait]
impl EventHandler for ThresholdWatch {
    fn name(&self) -> &'static str {
        "threshold_watch"
    }

    async fn handle(&self, event: &EventRecord) -> Vec<Arc<EventRecord>> {
        let EventPayload::SourceSnapshot(payload) = &event.payload else {
            return Vec::new();
        };
        let source_id = &payload.allocation_source_id;
        let Some(source) = self.directory.source(source_id).await else {
            return Vec::new();
        };
        let Some(allowed) = source.budget() else {
            return Vec::new();
        };

        let prev_pct = self
            .snapshots
            .source(source_id)
            .await
            .map_or(0, |prev| {
                ThresholdSchedule::usage_percentage(prev.compute_used, allowed)
            });
        let current_pct = ThresholdSchedule::usage_percentage(payload.compute_used, allowed);

        let Some(threshold) = self.schedule.highest_crossed(prev_pct, current_pct) else {
            return Vec::new();
        };

        let already_met = self
            .log
            .exists_matching(EventName::ThresholdMet, source_id.as_str(), |p| {
                matches!(p, EventPayload::ThresholdMet(m) if m.threshold == threshold)
            })
            .await;
        if already_met {
            tracing::debug!(%source_id, threshold, "threshold already recorded; skipping");
            return Vec::new();
        }

        let record = self
            .log
            .append(
                source_id.as_str(),
                EventPayload::ThresholdMet(ThresholdMetPayload {
                    allocation_source_id: source_id.clone(),
                    threshold,
                    actual_value: current_pct,
                }),
            )
            .await;
        tracing::info!(%source_id, threshold, actual_value = current_pct, "usage threshold met");
        vec![record]
    }
}

/// Detects budget exhaustion and dispatches enforcement
/// (`allocation_source_snapshot`).
///
/// Fires at most once ever per source; the guard event is never
/// re-armed. Enforcement itself is fire-and-forget.
#[derive(Debug)]
pub struct OverageWatch {
    directory: Arc<SourceDirectory>,
    log: Arc<EventLog>,
    enforcement: Arc<dyn EnforcementGateway>,
}

impl OverageWatch {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        directory: Arc<SourceDirectory>,
        log: Arc<EventLog>,
        enforcement: Arc<dyn EnforcementGateway>,
    ) -> Self {
        Self {
            directory,
            log,
            enforcement,
        }
    }
}

#[async_trait]
impl EventHandler for OverageWatch {
    fn name(&self) -> &'static str {
        "overage_watch"
    }

    async fn handle(&self, event: &EventRecord) -> Vec<Arc<EventRecord>> {
        let EventPayload::SourceSnapshot(payload) = &event.payload else {
            return Vec::new();
        };
        if payload.compute_used <= 0.0 {
            return Vec::new();
        }
        let source_id = &payload.allocation_source_id;
        let Some(source) = self.directory.source(source_id).await else {
            return Vec::new();
        };
        let Some(allowed) = source.budget() else {
            return Vec::new();
        };
        if payload.compute_used < allowed {
            return Vec::new();
        }

        if self
            .log
            .exists(EventName::ThresholdEnforced, source_id.as_str())
            .await
        {
            tracing::debug!(%source_id, "source already enforced; skipping");
            return Vec::new();
        }

        let actual_value = ThresholdSchedule::usage_percentage(payload.compute_used, allowed);
        let record = self
            .log
            .append(
                source_id.as_str(),
                EventPayload::ThresholdEnforced(ThresholdEnforcedPayload {
                    allocation_source_id: source_id.clone(),
                    actual_value,
                }),
            )
            .await;
        tracing::warn!(%source_id, actual_value, "budget exhausted; dispatching enforcement");

        let gateway = Arc::clone(&self.enforcement);
        let spawned_id = source_id.clone();
        tokio::spawn(async move {
            if let Err(error) = gateway.enforce(&spawned_id).await {
                tracing::warn!(source_id = %spawned_id, %error, "enforcement dispatch failed");
            }
        });

        vec![record]
    }
}

/// Sends usage notices to a source's users
/// (`allocation_source_threshold_met`).
///
/// A failure for one recipient is logged and does not stop delivery to
/// the rest.
#[derive(Debug)]
pub struct NoticeDispatch {
    directory: Arc<SourceDirectory>,
    notifier: Arc<dyn NotificationGateway>,
    notices_enabled: bool,
}

impl NoticeDispatch {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        directory: Arc<SourceDirectory>,
        notifier: Arc<dyn NotificationGateway>,
        notices_enabled: bool,
    ) -> Self {
        Self {
            directory,
            notifier,
            notices_enabled,
        }
    }
}

#[async_trait]
impl EventHandler for NoticeDispatch {
    fn name(&self) -> &'static str {
        "notice_dispatch"
    }

    async fn handle(&self, event: &EventRecord) -> Vec<Arc<EventRecord>> {
        let EventPayload::ThresholdMet(payload) = &event.payload else {
            return Vec::new();
        };
        if !self.notices_enabled {
            tracing::debug!("usage notices disabled; skipping");
            return Vec::new();
        }
        let source_id = &payload.allocation_source_id;
        let Some(source) = self.directory.source(source_id).await else {
            tracing::debug!(%source_id, "threshold met for unknown source; skipping notices");
            return Vec::new();
        };

        for username in self.directory.members(source_id).await {
            if let Err(error) = self
                .notifier
                .send_usage_notice(&username, &source, payload.threshold, payload.actual_value)
                .await
            {
                tracing::warn!(%username, %source_id, %error, "usage notice failed; continuing");
            }
        }
        Vec::new()
    }
}

/// Keeps per-user snapshots current (`user_allocation_snapshot_changed`).
#[derive(Debug)]
pub struct UserSnapshotIngest {
    directory: Arc<SourceDirectory>,
    snapshots: Arc<SnapshotStore>,
}

impl UserSnapshotIngest {
    /// Creates the handler.
    #[must_use]
    pub fn new(directory: Arc<SourceDirectory>, snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            directory,
            snapshots,
        }
    }
}

#[async_trait]
impl EventHandler for UserSnapshotIngest {
    fn name(&self) -> &'static str {
        "user_snapshot_ingest"
    }

    async fn handle(&self, event: &EventRecord) -> Vec<Arc<EventRecord>> {
        let EventPayload::UserSnapshot(payload) = &event.payload else {
            return Vec::new();
        };
        let source_id = &payload.allocation_source_id;
        if self.directory.source(source_id).await.is_none() {
            tracing::debug!(%source_id, "user snapshot for unknown source; skipping");
            return Vec::new();
        }
        if self.directory.user(&payload.username).await.is_none() {
            tracing::debug!(username = %payload.username, "user snapshot for unknown user; skipping");
            return Vec::new();
        }
        self.snapshots
            .upsert_user(
                source_id,
                &payload.username,
                payload.compute_used,
                payload.burn_rate,
            )
            .await;
        Vec::new()
    }
}

/// Keeps instance charging assignments current
/// (`instance_allocation_source_changed`).
#[derive(Debug)]
pub struct InstanceIngest {
    directory: Arc<SourceDirectory>,
    snapshots: Arc<SnapshotStore>,
}

impl InstanceIngest {
    /// Creates the handler.
    #[must_use]
    pub fn new(directory: Arc<SourceDirectory>, snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            directory,
            snapshots,
        }
    }
}

#[async_trait]
impl EventHandler for InstanceIngest {
    fn name(&self) -> &'static str {
        "instance_ingest"
    }

    async fn handle(&self, event: &EventRecord) -> Vec<Arc<EventRecord>> {
        let EventPayload::InstanceSource(payload) = &event.payload else {
            return Vec::new();
        };
        let source_id = &payload.allocation_source_id;
        if self.directory.source(source_id).await.is_none() {
            tracing::debug!(%source_id, "assignment for unknown source; skipping");
            return Vec::new();
        }
        if self.directory.instance(&payload.instance_id).await.is_none() {
            tracing::debug!(
                instance_id = %payload.instance_id,
                "assignment for unknown instance; skipping"
            );
            return Vec::new();
        }
        self.snapshots
            .upsert_instance(&payload.instance_id, source_id)
            .await;
        Vec::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AllocationSource, EventBus, SourceId, Username};
    use crate::error::LedgerError;
    use chrono::Utc;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct RecordingNotifier {
        sent: mpsc::UnboundedSender<(String, i64, i64)>,
        fail_for: Option<Username>,
    }

    #[async_trait]
    impl NotificationGateway for RecordingNotifier {
        async fn send_usage_notice(
            &self,
            username: &Username,
            _source: &AllocationSource,
            threshold: i64,
            actual_value: i64,
        ) -> Result<(), LedgerError> {
            if self.fail_for.as_ref() == Some(username) {
                return Err(LedgerError::GatewayFailure("smtp refused".to_string()));
            }
            let _ = self
                .sent
                .send((username.as_str().to_string(), threshold, actual_value));
            Ok(())
        }
    }

    fn threshold_met_event(source_id: &str, threshold: i64, actual_value: i64) -> EventRecord {
        EventRecord {
            sequence: 0,
            name: EventName::ThresholdMet,
            entity_id: source_id.to_string(),
            payload: EventPayload::ThresholdMet(ThresholdMetPayload {
                allocation_source_id: SourceId::new(source_id),
                threshold,
                actual_value,
            }),
            recorded_at: Utc::now(),
        }
    }

    async fn directory_with_source_and_members() -> Arc<SourceDirectory> {
        let directory = Arc::new(SourceDirectory::new());
        directory
            .insert_source_if_absent(AllocationSource {
                source_id: SourceId::new("s1"),
                name: "TG-1: test".to_string(),
                compute_allowed: Some(100.0),
            })
            .await;
        for name in ["abe", "bea", "carl"] {
            let _ = directory.register_user(Username::new(name)).await;
            directory.add_member(&SourceId::new("s1"), &Username::new(name)).await;
        }
        directory
    }

    #[tokio::test]
    async fn notice_failure_for_one_recipient_does_not_stop_the_rest() {
        let directory = directory_with_source_and_members().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(RecordingNotifier {
            sent: tx,
            fail_for: Some(Username::new("bea")),
        });
        let dispatch = NoticeDispatch::new(directory, notifier, true);

        let derived = dispatch.handle(&threshold_met_event("s1", 40, 43)).await;
        assert!(derived.is_empty());

        let mut delivered = Vec::new();
        while let Ok(sent) = rx.try_recv() {
            delivered.push(sent.0);
        }
        assert_eq!(delivered, vec!["abe".to_string(), "carl".to_string()]);
    }

    #[tokio::test]
    async fn notices_are_suppressed_when_globally_disabled() {
        let directory = directory_with_source_and_members().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(RecordingNotifier {
            sent: tx,
            fail_for: None,
        });
        let dispatch = NoticeDispatch::new(directory, notifier, false);

        dispatch.handle(&threshold_met_event("s1", 40, 43)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notice_payload_reaches_the_gateway_verbatim() {
        let directory = directory_with_source_and_members().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(RecordingNotifier {
            sent: tx,
            fail_for: None,
        });
        let dispatch = NoticeDispatch::new(directory, notifier, true);

        dispatch.handle(&threshold_met_event("s1", 80, 91)).await;

        let first = rx.try_recv().ok();
        let Some((_, threshold, actual_value)) = first else {
            panic!("expected a delivered notice");
        };
        assert_eq!(threshold, 80);
        assert_eq!(actual_value, 91);
    }
}
