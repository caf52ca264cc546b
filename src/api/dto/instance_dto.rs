//! Instance lifecycle DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{InstanceRecord, InstanceSnapshot, InstanceStatus};
use crate::service::InstanceSyncReport;

/// One instance as returned by `GET /instances`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstanceDto {
    /// Provider-assigned identifier.
    pub instance_id: String,
    /// Last observed lifecycle state.
    #[schema(value_type = String)]
    pub status: InstanceStatus,
    /// Source the instance charges against, per the latest
    /// assignment event.
    pub allocation_source_id: Option<String>,
    /// When the instance was first observed.
    pub launched_at: DateTime<Utc>,
    /// Set once the instance disappeared from the provider listing.
    pub ended_at: Option<DateTime<Utc>>,
}

impl InstanceDto {
    /// Joins a lifecycle record with its latest charging assignment.
    #[must_use]
    pub fn from_parts(record: &InstanceRecord, assignment: Option<&InstanceSnapshot>) -> Self {
        Self {
            instance_id: record.instance_id.as_str().to_string(),
            status: record.status,
            allocation_source_id: assignment.map(|a| a.source_id.as_str().to_string()),
            launched_at: record.launched_at,
            ended_at: record.ended_at,
        }
    }
}

/// Response body for `GET /instances`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstanceListResponse {
    /// Instance records ordered by id.
    pub data: Vec<InstanceDto>,
    /// Number of instances returned.
    pub count: usize,
}

/// One instance in a provider listing submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ObservedInstanceDto {
    /// Provider-assigned identifier.
    pub instance_id: String,
    /// Lifecycle state the provider reports. Unrecognized strings map
    /// to `"unknown"`.
    #[schema(value_type = String)]
    pub status: InstanceStatus,
}

/// Request body for `POST /instances/observed`: the provider's full
/// current listing.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ObservedInstancesRequest {
    /// Every instance currently visible at the provider.
    pub instances: Vec<ObservedInstanceDto>,
}

/// Response body for `POST /instances/observed`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstanceSyncResponse {
    /// Instances in the submitted listing.
    pub observed: usize,
    /// Previously unknown instances that were registered.
    pub registered: usize,
    /// Known instances whose status was refreshed.
    pub updated: usize,
    /// Open instances end-dated because the listing no longer has them.
    pub ended: usize,
}

impl From<InstanceSyncReport> for InstanceSyncResponse {
    fn from(report: InstanceSyncReport) -> Self {
        Self {
            observed: report.observed,
            registered: report.registered,
            updated: report.updated,
            ended: report.ended,
        }
    }
}
