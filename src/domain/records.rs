//! Registry records: allocation sources, users, and instances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{InstanceId, SourceId, Username};

/// Definition of one allocation source (a grant-like compute budget).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSource {
    /// Externally assigned identifier (immutable after creation).
    pub source_id: SourceId,
    /// Human-readable title, e.g. `"TG-123: Protein folding"`.
    pub name: String,
    /// Total compute hours granted. `None` or a non-positive value means
    /// no budget is configured and overage enforcement never applies.
    pub compute_allowed: Option<f64>,
}

impl AllocationSource {
    /// Returns the enforceable budget, if one is configured.
    #[must_use]
    pub fn budget(&self) -> Option<f64> {
        self.compute_allowed.filter(|allowed| *allowed > 0.0)
    }
}

/// A registered user known to the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    /// Service-wide unique username.
    pub username: Username,
    /// When the user was registered.
    pub registered_at: DateTime<Utc>,
}

/// Provider-reported lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Running and accruing usage.
    Active,
    /// Suspended on the hypervisor.
    Suspended,
    /// Shelved (no compute accrues).
    Shelved,
    /// Stopped by the user.
    Stopped,
    /// Status string the provider sent that we do not model.
    #[serde(other)]
    Unknown,
}

/// Lifecycle record for one virtual-machine instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceRecord {
    /// Provider-assigned identifier.
    pub instance_id: InstanceId,
    /// Last observed lifecycle state.
    pub status: InstanceStatus,
    /// When the instance was first observed.
    pub launched_at: DateTime<Utc>,
    /// Set when the instance disappears from the provider's listing.
    /// An end-dated instance stops accruing usage.
    pub ended_at: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    /// Returns `true` once the instance has been end-dated.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn budget_requires_a_positive_allowance() {
        let mut source = AllocationSource {
            source_id: SourceId::new("s1"),
            name: "TG-1: test".to_string(),
            compute_allowed: Some(168.0),
        };
        assert_eq!(source.budget(), Some(168.0));

        source.compute_allowed = Some(0.0);
        assert_eq!(source.budget(), None);

        source.compute_allowed = None;
        assert_eq!(source.budget(), None);
    }

    #[test]
    fn unmodeled_status_deserializes_to_unknown() {
        let status: Option<InstanceStatus> = serde_json::from_str("\"networking\"").ok();
        assert_eq!(status, Some(InstanceStatus::Unknown));
    }

    #[test]
    fn instance_is_ended_once_end_dated() {
        let mut record = InstanceRecord {
            instance_id: InstanceId::new("inst-1"),
            status: InstanceStatus::Active,
            launched_at: Utc::now(),
            ended_at: None,
        };
        assert!(!record.is_ended());
        record.ended_at = Some(Utc::now());
        assert!(record.is_ended());
    }
}
