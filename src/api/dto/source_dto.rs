//! Allocation source DTOs for list, detail, and membership endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{AllocationSource, SourceSnapshot, ThresholdSchedule, UserSnapshot};

/// Summary of one source for `GET /sources`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceSummaryDto {
    /// Externally assigned source id.
    pub source_id: String,
    /// Human-readable title.
    pub name: String,
    /// Compute hours granted, when a budget is configured.
    pub compute_allowed: Option<f64>,
    /// Latest observed usage, when a snapshot exists.
    pub compute_used: Option<f64>,
    /// Floor percentage of the budget consumed. Requires both a
    /// positive budget and a snapshot; values above 100 mean overage.
    pub usage_percentage: Option<i64>,
}

impl SourceSummaryDto {
    /// Joins a definition with its latest snapshot, if any.
    #[must_use]
    pub fn from_parts(source: &AllocationSource, snapshot: Option<&SourceSnapshot>) -> Self {
        let compute_used = snapshot.map(|s| s.compute_used);
        let usage_percentage = match (source.budget(), compute_used) {
            (Some(allowed), Some(used)) => {
                Some(ThresholdSchedule::usage_percentage(used, allowed))
            }
            _ => None,
        };
        Self {
            source_id: source.source_id.as_str().to_string(),
            name: source.name.clone(),
            compute_allowed: source.compute_allowed,
            compute_used,
            usage_percentage,
        }
    }
}

/// Latest aggregate snapshot in API form.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceSnapshotDto {
    /// Total compute hours consumed.
    pub compute_used: f64,
    /// Aggregate burn rate.
    pub global_burn_rate: f64,
    /// When the snapshot was stored.
    pub updated_at: DateTime<Utc>,
}

impl From<&SourceSnapshot> for SourceSnapshotDto {
    fn from(snapshot: &SourceSnapshot) -> Self {
        Self {
            compute_used: snapshot.compute_used,
            global_burn_rate: snapshot.global_burn_rate,
            updated_at: snapshot.updated_at,
        }
    }
}

/// Per-user snapshot in API form.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSnapshotDto {
    /// User the snapshot describes.
    pub username: String,
    /// Compute hours this user has consumed on the source.
    pub compute_used: f64,
    /// Burn rate for this user on the source.
    pub burn_rate: f64,
    /// When the snapshot was stored.
    pub updated_at: DateTime<Utc>,
}

impl From<&UserSnapshot> for UserSnapshotDto {
    fn from(snapshot: &UserSnapshot) -> Self {
        Self {
            username: snapshot.username.as_str().to_string(),
            compute_used: snapshot.compute_used,
            burn_rate: snapshot.burn_rate,
            updated_at: snapshot.updated_at,
        }
    }
}

/// Full detail for `GET /sources/{id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceDetailResponse {
    /// Externally assigned source id.
    pub source_id: String,
    /// Human-readable title.
    pub name: String,
    /// Compute hours granted, when a budget is configured.
    pub compute_allowed: Option<f64>,
    /// Latest aggregate snapshot, when one exists.
    pub snapshot: Option<SourceSnapshotDto>,
    /// Per-user snapshots on this source.
    pub users: Vec<UserSnapshotDto>,
}

/// Response body for `GET /sources`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceListResponse {
    /// Source summaries ordered by id.
    pub data: Vec<SourceSummaryDto>,
    /// Number of sources returned.
    pub count: usize,
}

/// Response body for `GET /sources/{id}/users` (membership).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceUsersResponse {
    /// Source the membership belongs to.
    pub source_id: String,
    /// Usernames associated with the source, ordered.
    pub users: Vec<String>,
    /// Number of members.
    pub count: usize,
}

/// Response body for `POST /reconcile`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileResponse {
    /// Sources newly registered from the authority listing.
    pub sources_created: usize,
    /// Existing sources whose budget was updated.
    pub sources_updated: usize,
    /// Memberships added while walking registered users.
    pub memberships_added: usize,
}

impl From<crate::service::ReconcileReport> for ReconcileResponse {
    fn from(report: crate::service::ReconcileReport) -> Self {
        Self {
            sources_created: report.sources_created,
            sources_updated: report.sources_updated,
            memberships_added: report.memberships_added,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use crate::domain::SourceId;

    use super::*;

    #[test]
    fn summary_reports_overage_percentages_past_100() {
        let source = AllocationSource {
            source_id: SourceId::new("37623"),
            name: "TG-1: trial".to_string(),
            compute_allowed: Some(100.0),
        };
        let snapshot = SourceSnapshot {
            source_id: SourceId::new("37623"),
            compute_used: 131.0,
            global_burn_rate: 2.0,
            updated_at: Utc::now(),
        };

        let dto = SourceSummaryDto::from_parts(&source, Some(&snapshot));
        assert_eq!(dto.usage_percentage, Some(131));
    }

    #[test]
    fn summary_without_budget_or_snapshot_has_no_percentage() {
        let unbudgeted = AllocationSource {
            source_id: SourceId::new("a"),
            name: "TG-a: none".to_string(),
            compute_allowed: None,
        };
        let snapshot = SourceSnapshot {
            source_id: SourceId::new("a"),
            compute_used: 10.0,
            global_burn_rate: 0.0,
            updated_at: Utc::now(),
        };
        let dto = SourceSummaryDto::from_parts(&unbudgeted, Some(&snapshot));
        assert_eq!(dto.usage_percentage, None);

        let budgeted = AllocationSource {
            source_id: SourceId::new("b"),
            name: "TG-b: fresh".to_string(),
            compute_allowed: Some(50.0),
        };
        let dto = SourceSummaryDto::from_parts(&budgeted, None);
        assert_eq!(dto.usage_percentage, None);
        assert_eq!(dto.compute_used, None);
    }
}
