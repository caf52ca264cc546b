//! Immutable accounting events and their fixed vocabulary.
//!
//! Every fact the service acts on is an [`EventRecord`] appended to the
//! [`super::EventLog`]. Producers deliver the three ingest names; the
//! accountant appends the two derived names. Payload field names are part
//! of the wire contract and never change shape per name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{InstanceId, SourceId, Username};
use crate::error::LedgerError;

/// Fixed vocabulary of event names.
///
/// Unknown names are rejected at the API boundary with
/// [`LedgerError::UnknownEventName`]; nothing downstream ever sees one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    /// Aggregate usage snapshot for one allocation source.
    #[serde(rename = "allocation_source_snapshot")]
    SourceSnapshot,
    /// Per-user usage snapshot within one allocation source.
    #[serde(rename = "user_allocation_snapshot_changed")]
    UserSnapshotChanged,
    /// An instance was (re)assigned to an allocation source.
    #[serde(rename = "instance_allocation_source_changed")]
    InstanceSourceChanged,
    /// Usage crossed a warning threshold (derived).
    #[serde(rename = "allocation_source_threshold_met")]
    ThresholdMet,
    /// Usage reached or exceeded the full budget (derived).
    #[serde(rename = "allocation_source_threshold_enforced")]
    ThresholdEnforced,
}

impl EventName {
    /// Returns the wire name of this event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SourceSnapshot => "allocation_source_snapshot",
            Self::UserSnapshotChanged => "user_allocation_snapshot_changed",
            Self::InstanceSourceChanged => "instance_allocation_source_changed",
            Self::ThresholdMet => "allocation_source_threshold_met",
            Self::ThresholdEnforced => "allocation_source_threshold_enforced",
        }
    }

    /// Parses a wire name into the vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownEventName`] for any name outside the
    /// five recognized ones.
    pub fn parse(name: &str) -> Result<Self, LedgerError> {
        match name {
            "allocation_source_snapshot" => Ok(Self::SourceSnapshot),
            "user_allocation_snapshot_changed" => Ok(Self::UserSnapshotChanged),
            "instance_allocation_source_changed" => Ok(Self::InstanceSourceChanged),
            "allocation_source_threshold_met" => Ok(Self::ThresholdMet),
            "allocation_source_threshold_enforced" => Ok(Self::ThresholdEnforced),
            other => Err(LedgerError::UnknownEventName(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of `allocation_source_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshotPayload {
    /// Allocation source the snapshot describes.
    pub allocation_source_id: SourceId,
    /// Total compute hours consumed so far (monotonically increasing
    /// counter maintained by the producer).
    pub compute_used: f64,
    /// Current aggregate burn rate across the source.
    pub global_burn_rate: f64,
}

/// Payload of `user_allocation_snapshot_changed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshotPayload {
    /// Allocation source the usage counts against.
    pub allocation_source_id: SourceId,
    /// User the snapshot describes.
    pub username: Username,
    /// Compute hours this user has consumed on this source.
    pub compute_used: f64,
    /// Current burn rate for this user on this source.
    pub burn_rate: f64,
}

/// Payload of `instance_allocation_source_changed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSourcePayload {
    /// Instance whose charging assignment changed.
    pub instance_id: InstanceId,
    /// Allocation source the instance now charges against.
    pub allocation_source_id: SourceId,
}

/// Payload of `allocation_source_threshold_met`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetPayload {
    /// Allocation source whose usage crossed the threshold.
    pub allocation_source_id: SourceId,
    /// The threshold percentage that was crossed.
    pub threshold: i64,
    /// Usage percentage observed at detection time.
    pub actual_value: i64,
}

/// Payload of `allocation_source_threshold_enforced`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEnforcedPayload {
    /// Allocation source that exhausted its budget.
    pub allocation_source_id: SourceId,
    /// Usage percentage observed at detection time.
    pub actual_value: i64,
}

/// Typed payload of an [`EventRecord`], one variant per [`EventName`].
///
/// Serializes untagged: the wire form is exactly the inner map, with the
/// event name carried separately on the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Aggregate usage snapshot.
    SourceSnapshot(SourceSnapshotPayload),
    /// Per-user usage snapshot.
    UserSnapshot(UserSnapshotPayload),
    /// Instance reassignment.
    InstanceSource(InstanceSourcePayload),
    /// Derived threshold crossing.
    ThresholdMet(ThresholdMetPayload),
    /// Derived budget exhaustion.
    ThresholdEnforced(ThresholdEnforcedPayload),
}

impl EventPayload {
    /// Returns the event name this payload belongs to.
    #[must_use]
    pub const fn name(&self) -> EventName {
        match self {
            Self::SourceSnapshot(_) => EventName::SourceSnapshot,
            Self::UserSnapshot(_) => EventName::UserSnapshotChanged,
            Self::InstanceSource(_) => EventName::InstanceSourceChanged,
            Self::ThresholdMet(_) => EventName::ThresholdMet,
            Self::ThresholdEnforced(_) => EventName::ThresholdEnforced,
        }
    }

    /// Returns the allocation source this payload concerns.
    ///
    /// Every payload in the vocabulary names exactly one source; ingestion
    /// uses this for its per-source critical section.
    #[must_use]
    pub const fn subject_source_id(&self) -> &SourceId {
        match self {
            Self::SourceSnapshot(p) => &p.allocation_source_id,
            Self::UserSnapshot(p) => &p.allocation_source_id,
            Self::InstanceSource(p) => &p.allocation_source_id,
            Self::ThresholdMet(p) => &p.allocation_source_id,
            Self::ThresholdEnforced(p) => &p.allocation_source_id,
        }
    }

    /// Parses a raw JSON payload against the shape required by `name`.
    ///
    /// Extra keys are tolerated; a missing required key or a wrong value
    /// type is a hard error, never a skip.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MalformedPayload`] when the payload does not
    /// deserialize into the shape `name` requires.
    pub fn parse(name: EventName, payload: &serde_json::Value) -> Result<Self, LedgerError> {
        fn typed<T: serde::de::DeserializeOwned>(
            value: &serde_json::Value,
        ) -> Result<T, LedgerError> {
            serde_json::from_value(value.clone())
                .map_err(|e| LedgerError::MalformedPayload(e.to_string()))
        }

        Ok(match name {
            EventName::SourceSnapshot => Self::SourceSnapshot(typed(payload)?),
            EventName::UserSnapshotChanged => Self::UserSnapshot(typed(payload)?),
            EventName::InstanceSourceChanged => Self::InstanceSource(typed(payload)?),
            EventName::ThresholdMet => Self::ThresholdMet(typed(payload)?),
            EventName::ThresholdEnforced => Self::ThresholdEnforced(typed(payload)?),
        })
    }
}

/// One persisted, immutable event.
///
/// Records are only ever appended; there is no update or delete anywhere
/// in the service.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Monotonic position in the log, assigned at append time.
    pub sequence: u64,
    /// Name from the fixed vocabulary.
    pub name: EventName,
    /// Aggregate the event belongs to. Stored as delivered; handlers key
    /// off the payload's `allocation_source_id`, not this field.
    pub entity_id: String,
    /// Typed payload matching `name`.
    pub payload: EventPayload,
    /// Timestamp assigned at append time.
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_round_trip() {
        for name in [
            EventName::SourceSnapshot,
            EventName::UserSnapshotChanged,
            EventName::InstanceSourceChanged,
            EventName::ThresholdMet,
            EventName::ThresholdEnforced,
        ] {
            let parsed = EventName::parse(name.as_str());
            assert_eq!(parsed.ok(), Some(name));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let result = EventName::parse("allocation_source_deleted");
        let Err(LedgerError::UnknownEventName(name)) = result else {
            panic!("expected UnknownEventName");
        };
        assert_eq!(name, "allocation_source_deleted");
    }

    #[test]
    fn parses_source_snapshot_payload() {
        let raw = json!({
            "allocation_source_id": "37623",
            "compute_used": 128.5,
            "global_burn_rate": 3.2,
        });
        let payload = EventPayload::parse(EventName::SourceSnapshot, &raw);
        let Ok(EventPayload::SourceSnapshot(p)) = payload else {
            panic!("expected SourceSnapshot payload");
        };
        assert_eq!(p.allocation_source_id.as_str(), "37623");
        assert!((p.compute_used - 128.5).abs() < f64::EPSILON);
    }

    #[test]
    fn integer_compute_used_is_accepted() {
        let raw = json!({
            "allocation_source_id": "37623",
            "compute_used": 128,
            "global_burn_rate": 0,
        });
        let payload = EventPayload::parse(EventName::SourceSnapshot, &raw);
        assert!(payload.is_ok());
    }

    #[test]
    fn missing_key_is_malformed() {
        let raw = json!({
            "allocation_source_id": "37623",
            "global_burn_rate": 3.2,
        });
        let result = EventPayload::parse(EventName::SourceSnapshot, &raw);
        let Err(LedgerError::MalformedPayload(msg)) = result else {
            panic!("expected MalformedPayload");
        };
        assert!(msg.contains("compute_used"));
    }

    #[test]
    fn wrong_value_type_is_malformed() {
        let raw = json!({
            "allocation_source_id": "37623",
            "compute_used": "a lot",
            "global_burn_rate": 3.2,
        });
        let result = EventPayload::parse(EventName::SourceSnapshot, &raw);
        assert!(matches!(result, Err(LedgerError::MalformedPayload(_))));
    }

    #[test]
    fn extra_keys_are_tolerated() {
        let raw = json!({
            "allocation_source_id": "37623",
            "compute_used": 10.0,
            "global_burn_rate": 0.5,
            "reported_by": "monitor-7",
        });
        let payload = EventPayload::parse(EventName::SourceSnapshot, &raw);
        assert!(payload.is_ok());
    }

    #[test]
    fn payload_serializes_untagged() {
        let payload = EventPayload::ThresholdMet(ThresholdMetPayload {
            allocation_source_id: SourceId::new("37623"),
            threshold: 80,
            actual_value: 83,
        });
        let value = serde_json::to_value(&payload).unwrap_or_default();
        assert_eq!(
            value,
            json!({
                "allocation_source_id": "37623",
                "threshold": 80,
                "actual_value": 83,
            })
        );
    }

    #[test]
    fn subject_source_id_covers_every_variant() {
        let payload = EventPayload::InstanceSource(InstanceSourcePayload {
            instance_id: InstanceId::new("inst-9"),
            allocation_source_id: SourceId::new("37623"),
        });
        assert_eq!(payload.subject_source_id().as_str(), "37623");
    }

    #[test]
    fn record_serializes_with_name_and_payload() {
        let record = EventRecord {
            sequence: 7,
            name: EventName::ThresholdEnforced,
            entity_id: "37623".to_string(),
            payload: EventPayload::ThresholdEnforced(ThresholdEnforcedPayload {
                allocation_source_id: SourceId::new("37623"),
                actual_value: 104,
            }),
            recorded_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap_or_default();
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["name"], "allocation_source_threshold_enforced");
        assert_eq!(value["payload"]["allocation_source_id"], "37623");
    }
}
