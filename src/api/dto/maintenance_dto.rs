//! Maintenance window DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::MaintenanceWindow;

/// Request body for `POST /maintenance`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScheduleWindowRequest {
    /// Short operator-facing title.
    pub title: String,
    /// Longer description shown to operators.
    #[serde(default)]
    pub message: String,
    /// When the window opens. Missing means immediately.
    pub starts_at: Option<DateTime<Utc>>,
    /// When the window closes. Missing keeps it open until ended
    /// explicitly.
    pub ends_at: Option<DateTime<Utc>>,
}

/// One maintenance window as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceWindowDto {
    /// Window identifier.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Description.
    pub message: String,
    /// When the window opens.
    pub starts_at: DateTime<Utc>,
    /// When the window closes, if scheduled.
    pub ends_at: Option<DateTime<Utc>>,
    /// Whether the window covers the time of the request.
    pub active: bool,
}

impl MaintenanceWindowDto {
    /// Converts a window, evaluating `active` against `now`.
    #[must_use]
    pub fn from_window(window: &MaintenanceWindow, now: DateTime<Utc>) -> Self {
        Self {
            id: window.id,
            title: window.title.clone(),
            message: window.message.clone(),
            starts_at: window.starts_at,
            ends_at: window.ends_at,
            active: window.is_active(now),
        }
    }
}

/// Response body for `GET /maintenance`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceListResponse {
    /// Windows, newest first.
    pub data: Vec<MaintenanceWindowDto>,
    /// Number of windows returned.
    pub count: usize,
}
