//! System-of-record registry for sources, users, memberships, and
//! instances.
//!
//! [`SourceDirectory`] is written by reconciliation and user
//! registration, and read by the accountant (membership lookups for
//! notices) and the REST API. Usage numbers never live here; those
//! belong to the snapshot store.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ids::{InstanceId, SourceId, Username};
use super::records::{AllocationSource, InstanceRecord, InstanceStatus, UserRecord};
use crate::error::LedgerError;

/// Concurrent registry of definitions and relationships.
#[derive(Debug, Default)]
pub struct SourceDirectory {
    sources: RwLock<HashMap<SourceId, AllocationSource>>,
    users: RwLock<HashMap<Username, UserRecord>>,
    members: RwLock<HashMap<SourceId, BTreeSet<Username>>>,
    instances: RwLock<HashMap<InstanceId, InstanceRecord>>,
}

impl SourceDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a source definition unless one already exists.
    ///
    /// Returns `true` when the source was created by this call.
    pub async fn insert_source_if_absent(&self, source: AllocationSource) -> bool {
        let mut sources = self.sources.write().await;
        if sources.contains_key(&source.source_id) {
            return false;
        }
        sources.insert(source.source_id.clone(), source);
        true
    }

    /// Updates the budget of an existing source.
    ///
    /// Returns `true` when the stored value changed, `false` when the
    /// source is unknown or already carried this budget.
    pub async fn set_compute_allowed(
        &self,
        source_id: &SourceId,
        compute_allowed: Option<f64>,
    ) -> bool {
        let mut sources = self.sources.write().await;
        match sources.get_mut(source_id) {
            Some(source) if source.compute_allowed != compute_allowed => {
                source.compute_allowed = compute_allowed;
                true
            }
            _ => false,
        }
    }

    /// Returns the definition of a source, if registered.
    pub async fn source(&self, source_id: &SourceId) -> Option<AllocationSource> {
        self.sources.read().await.get(source_id).cloned()
    }

    /// Returns all source definitions, ordered by id.
    pub async fn all_sources(&self) -> Vec<AllocationSource> {
        let sources = self.sources.read().await;
        let mut all: Vec<AllocationSource> = sources.values().cloned().collect();
        all.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        all
    }

    /// Returns the number of registered sources.
    pub async fn source_count(&self) -> usize {
        self.sources.read().await.len()
    }

    /// Registers a new user.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateUser`] when the username is
    /// already registered.
    pub async fn register_user(&self, username: Username) -> Result<UserRecord, LedgerError> {
        let mut users = self.users.write().await;
        if users.contains_key(&username) {
            return Err(LedgerError::DuplicateUser(username.into_inner()));
        }
        let record = UserRecord {
            username: username.clone(),
            registered_at: Utc::now(),
        };
        users.insert(username, record.clone());
        Ok(record)
    }

    /// Returns a registered user, if any.
    pub async fn user(&self, username: &Username) -> Option<UserRecord> {
        self.users.read().await.get(username).cloned()
    }

    /// Returns all registered users, ordered by username.
    pub async fn all_users(&self) -> Vec<UserRecord> {
        let users = self.users.read().await;
        let mut all: Vec<UserRecord> = users.values().cloned().collect();
        all.sort_by(|a, b| a.username.cmp(&b.username));
        all
    }

    /// Adds a user to a source's membership.
    ///
    /// Returns `true` when the membership is new.
    pub async fn add_member(&self, source_id: &SourceId, username: &Username) -> bool {
        let mut members = self.members.write().await;
        members
            .entry(source_id.clone())
            .or_default()
            .insert(username.clone())
    }

    /// Returns the usernames associated with a source, ordered.
    pub async fn members(&self, source_id: &SourceId) -> Vec<Username> {
        let members = self.members.read().await;
        members
            .get(source_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Inserts or replaces an instance lifecycle record.
    pub async fn record_instance(&self, record: InstanceRecord) {
        self.instances
            .write()
            .await
            .insert(record.instance_id.clone(), record);
    }

    /// Returns the lifecycle record for an instance, if any.
    pub async fn instance(&self, instance_id: &InstanceId) -> Option<InstanceRecord> {
        self.instances.read().await.get(instance_id).cloned()
    }

    /// Returns all instance records, ordered by id.
    pub async fn all_instances(&self) -> Vec<InstanceRecord> {
        let instances = self.instances.read().await;
        let mut all: Vec<InstanceRecord> = instances.values().cloned().collect();
        all.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        all
    }

    /// Updates the observed status of an instance.
    ///
    /// Returns `false` when the instance is unknown.
    pub async fn set_instance_status(
        &self,
        instance_id: &InstanceId,
        status: InstanceStatus,
    ) -> bool {
        let mut instances = self.instances.write().await;
        match instances.get_mut(instance_id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// End-dates an instance that disappeared from the provider listing.
    ///
    /// Returns `true` when the instance was open and is now ended;
    /// already-ended or unknown instances are left untouched.
    pub async fn end_instance(&self, instance_id: &InstanceId, ended_at: DateTime<Utc>) -> bool {
        let mut instances = self.instances.write().await;
        match instances.get_mut(instance_id) {
            Some(record) if record.ended_at.is_none() => {
                record.ended_at = Some(ended_at);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_source(id: &str) -> AllocationSource {
        AllocationSource {
            source_id: SourceId::new(id),
            name: format!("TG-{id}: test"),
            compute_allowed: Some(100.0),
        }
    }

    #[tokio::test]
    async fn insert_source_if_absent_is_get_or_create() {
        let directory = SourceDirectory::new();
        assert!(directory.insert_source_if_absent(make_source("s1")).await);
        assert!(!directory.insert_source_if_absent(make_source("s1")).await);
        assert_eq!(directory.source_count().await, 1);
    }

    #[tokio::test]
    async fn set_compute_allowed_reports_change() {
        let directory = SourceDirectory::new();
        directory.insert_source_if_absent(make_source("s1")).await;

        let id = SourceId::new("s1");
        assert!(directory.set_compute_allowed(&id, Some(200.0)).await);
        assert!(!directory.set_compute_allowed(&id, Some(200.0)).await);
        assert!(!directory.set_compute_allowed(&SourceId::new("nope"), Some(1.0)).await);

        let stored = directory.source(&id).await;
        let Some(stored) = stored else {
            panic!("expected source");
        };
        assert_eq!(stored.compute_allowed, Some(200.0));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let directory = SourceDirectory::new();
        let first = directory.register_user(Username::new("sgregory")).await;
        assert!(first.is_ok());

        let second = directory.register_user(Username::new("sgregory")).await;
        let Err(LedgerError::DuplicateUser(name)) = second else {
            panic!("expected DuplicateUser");
        };
        assert_eq!(name, "sgregory");
    }

    #[tokio::test]
    async fn membership_is_deduplicated_and_ordered() {
        let directory = SourceDirectory::new();
        let id = SourceId::new("s1");

        assert!(directory.add_member(&id, &Username::new("zoe")).await);
        assert!(directory.add_member(&id, &Username::new("abe")).await);
        assert!(!directory.add_member(&id, &Username::new("zoe")).await);

        let members = directory.members(&id).await;
        let names: Vec<&str> = members.iter().map(Username::as_str).collect();
        assert_eq!(names, vec!["abe", "zoe"]);
    }

    #[tokio::test]
    async fn end_instance_is_one_way() {
        let directory = SourceDirectory::new();
        let id = InstanceId::new("inst-1");
        directory
            .record_instance(InstanceRecord {
                instance_id: id.clone(),
                status: InstanceStatus::Active,
                launched_at: Utc::now(),
                ended_at: None,
            })
            .await;

        assert!(directory.end_instance(&id, Utc::now()).await);
        assert!(!directory.end_instance(&id, Utc::now()).await);
        assert!(!directory.end_instance(&InstanceId::new("ghost"), Utc::now()).await);

        let record = directory.instance(&id).await;
        let Some(record) = record else {
            panic!("expected instance");
        };
        assert!(record.is_ended());
    }

    #[tokio::test]
    async fn set_instance_status_requires_known_instance() {
        let directory = SourceDirectory::new();
        assert!(
            !directory
                .set_instance_status(&InstanceId::new("ghost"), InstanceStatus::Shelved)
                .await
        );
    }
}
