//! Maintenance windows that pause background reconciliation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::LedgerError;

/// One scheduled maintenance window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceWindow {
    /// Window identifier, assigned at scheduling time.
    pub id: Uuid,
    /// Short operator-facing title.
    pub title: String,
    /// Longer description shown to operators.
    pub message: String,
    /// When the window opens.
    pub starts_at: DateTime<Utc>,
    /// When the window closes. `None` keeps it open until ended
    /// explicitly.
    pub ends_at: Option<DateTime<Utc>>,
}

impl MaintenanceWindow {
    /// Returns `true` while the window covers `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && self.ends_at.is_none_or(|ends| ends > now)
    }
}

/// In-memory calendar of maintenance windows.
///
/// Consulted by the reconciliation loop before each cycle; managed over
/// the REST API.
#[derive(Debug, Default)]
pub struct MaintenanceCalendar {
    windows: RwLock<Vec<MaintenanceWindow>>,
}

impl MaintenanceCalendar {
    /// Creates an empty calendar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a window. A missing `starts_at` opens it immediately.
    pub async fn schedule(
        &self,
        title: String,
        message: String,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> MaintenanceWindow {
        let window = MaintenanceWindow {
            id: Uuid::new_v4(),
            title,
            message,
            starts_at: starts_at.unwrap_or_else(Utc::now),
            ends_at,
        };
        self.windows.write().await.push(window.clone());
        window
    }

    /// Ends a window now. Ending an already-ended window is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WindowNotFound`] when no window has this id.
    pub async fn end(&self, id: Uuid) -> Result<MaintenanceWindow, LedgerError> {
        let mut windows = self.windows.write().await;
        let window = windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(LedgerError::WindowNotFound(id))?;
        if window.ends_at.is_none() {
            window.ends_at = Some(Utc::now());
        }
        Ok(window.clone())
    }

    /// Returns `true` while any window covers `now`.
    pub async fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.windows.read().await.iter().any(|w| w.is_active(now))
    }

    /// Returns the windows covering `now`.
    pub async fn active(&self, now: DateTime<Utc>) -> Vec<MaintenanceWindow> {
        self.windows
            .read()
            .await
            .iter()
            .filter(|w| w.is_active(now))
            .cloned()
            .collect()
    }

    /// Returns every window, newest first.
    pub async fn all(&self) -> Vec<MaintenanceWindow> {
        let windows = self.windows.read().await;
        let mut all: Vec<MaintenanceWindow> = windows.clone();
        all.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        all
    }
}
