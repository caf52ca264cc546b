//! Database models for archived events and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EventName, EventPayload, EventRecord, SourceId, SourceSnapshot};
use crate::error::LedgerError;

/// A stored event row from the `events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Position the event held in the in-memory log.
    pub sequence: i64,
    /// Event name (e.g. `"allocation_source_snapshot"`).
    pub name: String,
    /// Entity the event was delivered for.
    pub entity_id: String,
    /// JSONB payload with event-specific data.
    pub payload: serde_json::Value,
    /// When the event was appended.
    pub recorded_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Converts the row back into a log record for replay.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownEventName`] or
    /// [`LedgerError::MalformedPayload`] when the row predates the
    /// current vocabulary or its payload no longer parses.
    pub fn into_record(self) -> Result<EventRecord, LedgerError> {
        let name = EventName::parse(&self.name)?;
        let payload = EventPayload::parse(name, &self.payload)?;
        Ok(EventRecord {
            sequence: u64::try_from(self.sequence).unwrap_or(0),
            name,
            entity_id: self.entity_id,
            payload,
            recorded_at: self.recorded_at,
        })
    }
}

/// A source snapshot row from the `source_snapshots` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSourceSnapshot {
    /// Auto-increment row ID.
    pub id: i64,
    /// Allocation source the snapshot describes.
    pub source_id: String,
    /// Total compute hours consumed at dump time.
    pub compute_used: f64,
    /// Aggregate burn rate at dump time.
    pub global_burn_rate: f64,
    /// When the in-memory snapshot was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the row was written.
    pub snapshot_at: DateTime<Utc>,
}

impl StoredSourceSnapshot {
    /// Converts the row into the in-memory snapshot shape, dropping the
    /// archival columns.
    #[must_use]
    pub fn into_snapshot(self) -> SourceSnapshot {
        SourceSnapshot {
            source_id: SourceId::new(self.source_id),
            compute_used: self.compute_used,
            global_burn_rate: self.global_burn_rate,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stored_event_replays_into_a_record() {
        let row = StoredEvent {
            id: 7,
            sequence: 41,
            name: "allocation_source_snapshot".to_string(),
            entity_id: "37623".to_string(),
            payload: json!({
                "allocation_source_id": "37623",
                "compute_used": 92.5,
                "global_burn_rate": 1.5,
            }),
            recorded_at: Utc::now(),
        };
        let Ok(record) = row.into_record() else {
            panic!("expected row to convert");
        };
        assert_eq!(record.sequence, 41);
        assert_eq!(record.name, EventName::SourceSnapshot);
        assert_eq!(record.entity_id, "37623");
    }

    #[test]
    fn unreadable_rows_are_errors_not_panics() {
        let unknown = StoredEvent {
            id: 1,
            sequence: 1,
            name: "allocation_source_deleted".to_string(),
            entity_id: "37623".to_string(),
            payload: json!({}),
            recorded_at: Utc::now(),
        };
        assert!(matches!(
            unknown.into_record(),
            Err(LedgerError::UnknownEventName(_))
        ));

        let malformed = StoredEvent {
            id: 2,
            sequence: 2,
            name: "allocation_source_snapshot".to_string(),
            entity_id: "37623".to_string(),
            payload: json!({"allocation_source_id": "37623"}),
            recorded_at: Utc::now(),
        };
        assert!(matches!(
            malformed.into_record(),
            Err(LedgerError::MalformedPayload(_))
        ));
    }
}
