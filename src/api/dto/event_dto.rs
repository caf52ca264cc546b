//! Event ingestion and audit DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::EventRecord;

/// Request body for `POST /events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Event name from the fixed vocabulary
    /// (e.g. `"allocation_source_snapshot"`).
    pub name: String,
    /// Entity the event is delivered for.
    pub entity_id: String,
    /// Event-specific payload.
    pub payload: serde_json::Value,
}

/// One recorded event as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventRecordDto {
    /// Position in the log.
    pub sequence: u64,
    /// Event name.
    pub name: String,
    /// Entity the event was delivered for.
    pub entity_id: String,
    /// Event payload.
    pub payload: serde_json::Value,
    /// When the event was appended.
    pub recorded_at: DateTime<Utc>,
}

impl From<&EventRecord> for EventRecordDto {
    fn from(record: &EventRecord) -> Self {
        Self {
            sequence: record.sequence,
            name: record.name.as_str().to_string(),
            entity_id: record.entity_id.clone(),
            payload: serde_json::to_value(&record.payload).unwrap_or_default(),
            recorded_at: record.recorded_at,
        }
    }
}

/// Query parameters for `GET /events`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventQueryParams {
    /// Only events with this name.
    pub name: Option<String>,
    /// Only events delivered for this entity.
    pub entity_id: Option<String>,
    /// Maximum number of events to return (1-500, default 50).
    pub limit: Option<usize>,
}

impl EventQueryParams {
    /// Effective limit clamped to the allowed range.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}

/// Response body for `GET /events`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Matching events, newest first.
    pub data: Vec<EventRecordDto>,
    /// Number of events returned.
    pub count: usize,
}
