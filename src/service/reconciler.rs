//! Reconciliation against the allocation authority and the provider's
//! instance listing.
//!
//! A cycle pulls the authority's allocation listing, creates or updates
//! local source definitions, then walks registered users and repairs
//! their memberships. Instance synchronisation is driven separately by
//! whoever observes the provider (the `/instances/observed` endpoint).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::authority::{AllocationAuthority, AuthorityCache};
use crate::domain::{
    InstanceId, InstanceRecord, InstanceStatus, MaintenanceCalendar, SourceDirectory,
};
use crate::error::LedgerError;

/// Counters from one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Sources newly registered from the authority listing.
    pub sources_created: usize,
    /// Existing sources whose budget was updated.
    pub sources_updated: usize,
    /// Memberships added while walking registered users.
    pub memberships_added: usize,
}

/// Counters from one instance synchronisation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstanceSyncReport {
    /// Instances in the submitted listing.
    pub observed: usize,
    /// Previously unknown instances that were registered.
    pub registered: usize,
    /// Known instances whose status was refreshed.
    pub updated: usize,
    /// Open instances end-dated because the listing no longer has them.
    pub ended: usize,
}

/// One instance as observed in the provider's current listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedInstance {
    /// Provider-assigned identifier.
    pub instance_id: InstanceId,
    /// Lifecycle state the provider reports right now.
    pub status: InstanceStatus,
}

/// Keeps the source directory aligned with the allocation authority.
///
/// The authority itself is optional; without one, instance
/// synchronisation still works but source and membership reconciliation
/// report an [`LedgerError::AuthorityError`].
#[derive(Debug)]
pub struct ReconcileService {
    authority: Option<Arc<dyn AllocationAuthority>>,
    cache: AuthorityCache,
    directory: Arc<SourceDirectory>,
    calendar: Arc<MaintenanceCalendar>,
}

impl ReconcileService {
    /// Wires a reconciler over the given authority and registries.
    #[must_use]
    pub fn new(
        authority: Option<Arc<dyn AllocationAuthority>>,
        directory: Arc<SourceDirectory>,
        calendar: Arc<MaintenanceCalendar>,
    ) -> Self {
        Self {
            authority,
            cache: AuthorityCache::new(),
            directory,
            calendar,
        }
    }

    /// Cycle-scoped cache of the authority listing.
    #[must_use]
    pub fn cache(&self) -> &AuthorityCache {
        &self.cache
    }

    fn authority(&self) -> Result<&dyn AllocationAuthority, LedgerError> {
        self.authority.as_deref().ok_or_else(|| {
            LedgerError::AuthorityError("no allocation authority configured".to_string())
        })
    }

    /// Runs one full cycle: fresh listing, source pass, membership pass.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when no authority is
    /// configured or the allocation listing cannot be fetched. Per-user
    /// lookup failures do not abort the cycle.
    pub async fn run_cycle(&self, update_existing: bool) -> Result<ReconcileReport, LedgerError> {
        let authority = self.authority()?;
        self.cache.invalidate().await;
        let (sources_created, sources_updated) =
            self.source_pass(authority, update_existing).await?;
        let memberships_added = self.membership_pass(authority).await;
        Ok(ReconcileReport {
            sources_created,
            sources_updated,
            memberships_added,
        })
    }

    /// Registers every allocation in the authority listing that is not
    /// yet known locally. With `update_existing`, budgets of known
    /// sources are refreshed from the listing as well.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when no authority is
    /// configured, the listing cannot be fetched, or an entry is
    /// malformed.
    pub async fn reconcile_sources(
        &self,
        update_existing: bool,
    ) -> Result<(usize, usize), LedgerError> {
        let authority = self.authority()?;
        self.source_pass(authority, update_existing).await
    }

    async fn source_pass(
        &self,
        authority: &dyn AllocationAuthority,
        update_existing: bool,
    ) -> Result<(usize, usize), LedgerError> {
        let allocations = self.cache.ensure(authority).await?;
        let mut created = 0;
        let mut updated = 0;
        for allocation in allocations {
            let source = allocation.to_source();
            let source_id = source.source_id.clone();
            let compute_allowed = source.compute_allowed;
            if self.directory.insert_source_if_absent(source).await {
                tracing::info!(%source_id, "registered allocation source from authority listing");
                created += 1;
            } else if update_existing
                && self
                    .directory
                    .set_compute_allowed(&source_id, compute_allowed)
                    .await
            {
                tracing::info!(%source_id, ?compute_allowed, "refreshed source budget from authority listing");
                updated += 1;
            }
        }
        Ok((created, updated))
    }

    /// Walks registered users and adds any memberships the authority
    /// reports that are missing locally. Returns the number added.
    ///
    /// A user whose authority account cannot be resolved is retried
    /// under the local username; a user whose allocation lookup fails is
    /// skipped until the next cycle.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when no authority is
    /// configured.
    pub async fn reconcile_memberships(&self) -> Result<usize, LedgerError> {
        let authority = self.authority()?;
        Ok(self.membership_pass(authority).await)
    }

    async fn membership_pass(&self, authority: &dyn AllocationAuthority) -> usize {
        let mut added = 0;
        for user in self.directory.all_users().await {
            let username = user.username;
            let account = match authority.resolve_username(username.as_str()).await {
                Ok(account) => account,
                Err(error) => {
                    tracing::info!(%username, %error, "no authority account; using local username");
                    username.as_str().to_string()
                }
            };
            let allocations = match authority.user_allocations(&account).await {
                Ok(allocations) => allocations,
                Err(error) => {
                    tracing::info!(%username, %error, "skipping user; allocation lookup failed");
                    continue;
                }
            };
            if allocations.is_empty() {
                tracing::info!(%username, "user holds no allocations on this resource");
                continue;
            }
            for allocation in allocations {
                let source = allocation.to_source();
                let source_id = source.source_id.clone();
                self.directory.insert_source_if_absent(source).await;
                if self.directory.add_member(&source_id, &username).await {
                    tracing::info!(%username, %source_id, "added membership from authority");
                    added += 1;
                }
            }
        }
        added
    }

    /// Aligns instance lifecycle records with the provider's listing:
    /// open instances missing from it are end-dated, listed instances
    /// get their status refreshed, and unknown ones are registered.
    pub async fn sync_instances(&self, observed: Vec<ObservedInstance>) -> InstanceSyncReport {
        let now = Utc::now();
        let observed_ids: HashSet<&InstanceId> =
            observed.iter().map(|item| &item.instance_id).collect();
        let mut report = InstanceSyncReport {
            observed: observed.len(),
            ..InstanceSyncReport::default()
        };

        for record in self.directory.all_instances().await {
            if !observed_ids.contains(&record.instance_id)
                && self.directory.end_instance(&record.instance_id, now).await
            {
                tracing::info!(
                    instance_id = %record.instance_id,
                    "instance gone from provider listing; end-dating"
                );
                report.ended += 1;
            }
        }

        for item in observed {
            if self
                .directory
                .set_instance_status(&item.instance_id, item.status)
                .await
            {
                report.updated += 1;
            } else {
                tracing::info!(instance_id = %item.instance_id, "registered newly observed instance");
                self.directory
                    .record_instance(InstanceRecord {
                        instance_id: item.instance_id,
                        status: item.status,
                        launched_at: now,
                        ended_at: None,
                    })
                    .await;
                report.registered += 1;
            }
        }
        report
    }

    /// Drives cycles on a fixed interval until the task is aborted.
    /// Cycles that land inside an active maintenance window are skipped.
    pub async fn run_periodic(self: Arc<Self>, interval: Duration) {
        if self.authority.is_none() {
            tracing::info!("no allocation authority configured; reconciliation loop disabled");
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.calendar.is_active(Utc::now()).await {
                tracing::info!("maintenance window active; skipping reconciliation cycle");
                continue;
            }
            match self.run_cycle(true).await {
                Ok(report) => tracing::info!(
                    sources_created = report.sources_created,
                    sources_updated = report.sources_updated,
                    memberships_added = report.memberships_added,
                    "reconciliation cycle complete"
                ),
                Err(error) => tracing::warn!(%error, "reconciliation cycle failed"),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use crate::authority::AuthorityAllocation;
    use crate::domain::{SourceId, Username};

    use super::*;

    #[derive(Debug, Default)]
    struct StubAuthority {
        listing: Vec<AuthorityAllocation>,
        accounts: HashMap<String, String>,
        grants: HashMap<String, Vec<AuthorityAllocation>>,
        fail_listing: bool,
        fail_grants_for: HashSet<String>,
    }

    #[async_trait]
    impl AllocationAuthority for StubAuthority {
        async fn allocations(&self) -> Result<Vec<AuthorityAllocation>, LedgerError> {
            if self.fail_listing {
                return Err(LedgerError::AuthorityError("listing down".to_string()));
            }
            Ok(self.listing.clone())
        }

        async fn user_allocations(
            &self,
            username: &str,
        ) -> Result<Vec<AuthorityAllocation>, LedgerError> {
            if self.fail_grants_for.contains(username) {
                return Err(LedgerError::AuthorityError("lookup failed".to_string()));
            }
            Ok(self.grants.get(username).cloned().unwrap_or_default())
        }

        async fn resolve_username(&self, username: &str) -> Result<String, LedgerError> {
            self.accounts.get(username).cloned().ok_or_else(|| {
                LedgerError::AuthorityError(format!("no account for {username}"))
            })
        }
    }

    fn allocation(id: &str, compute: f64) -> AuthorityAllocation {
        AuthorityAllocation {
            id: id.to_string(),
            project: "TG-1".to_string(),
            justification: "trial".to_string(),
            compute_allocated: compute,
        }
    }

    fn service(authority: StubAuthority) -> ReconcileService {
        ReconcileService::new(
            Some(Arc::new(authority)),
            Arc::new(SourceDirectory::new()),
            Arc::new(MaintenanceCalendar::new()),
        )
    }

    #[tokio::test]
    async fn cycle_registers_sources_and_memberships() {
        let mut authority = StubAuthority {
            listing: vec![allocation("37623", 128.0)],
            ..StubAuthority::default()
        };
        authority
            .accounts
            .insert("sgregory".to_string(), "sgregory9".to_string());
        authority
            .grants
            .insert("sgregory9".to_string(), vec![allocation("37623", 128.0)]);

        let service = service(authority);
        let registered = service
            .directory
            .register_user(Username::new("sgregory"))
            .await;
        assert!(registered.is_ok());

        let Ok(report) = service.run_cycle(true).await else {
            panic!("expected cycle to succeed");
        };
        assert_eq!(
            report,
            ReconcileReport {
                sources_created: 1,
                sources_updated: 0,
                memberships_added: 1,
            }
        );

        let source_id = SourceId::new("37623");
        let source = service.directory.source(&source_id).await;
        let Some(source) = source else {
            panic!("expected source to be registered");
        };
        assert_eq!(source.name, "TG-1: trial");
        assert_eq!(source.compute_allowed, Some(128.0));

        let members = service.directory.members(&source_id).await;
        assert_eq!(members, vec![Username::new("sgregory")]);
    }

    #[tokio::test]
    async fn repeated_cycles_are_idempotent() {
        let mut authority = StubAuthority {
            listing: vec![allocation("37623", 128.0)],
            ..StubAuthority::default()
        };
        authority
            .accounts
            .insert("walt".to_string(), "walt".to_string());
        authority
            .grants
            .insert("walt".to_string(), vec![allocation("37623", 128.0)]);

        let service = service(authority);
        let _ = service.directory.register_user(Username::new("walt")).await;

        let first = service.run_cycle(true).await.unwrap_or_default();
        assert_eq!(first.sources_created, 1);
        let second = service.run_cycle(true).await.unwrap_or_default();
        assert_eq!(second, ReconcileReport::default());
    }

    #[tokio::test]
    async fn budget_refresh_requires_update_existing() {
        let service = service(StubAuthority {
            listing: vec![allocation("37623", 256.0)],
            ..StubAuthority::default()
        });
        let source_id = SourceId::new("37623");
        service
            .directory
            .insert_source_if_absent(allocation("37623", 128.0).to_source())
            .await;

        let Ok(counts) = service.reconcile_sources(false).await else {
            panic!("expected pass to succeed");
        };
        assert_eq!(counts, (0, 0));

        let Ok(counts) = service.reconcile_sources(true).await else {
            panic!("expected pass to succeed");
        };
        assert_eq!(counts, (0, 1));

        let budget = service
            .directory
            .source(&source_id)
            .await
            .and_then(|source| source.compute_allowed);
        assert_eq!(budget, Some(256.0));
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_cycle() {
        let service = service(StubAuthority {
            fail_listing: true,
            ..StubAuthority::default()
        });
        let Err(LedgerError::AuthorityError(_)) = service.run_cycle(true).await else {
            panic!("expected AuthorityError");
        };
    }

    #[tokio::test]
    async fn unresolved_account_falls_back_to_local_username() {
        let mut authority = StubAuthority::default();
        authority
            .grants
            .insert("walt".to_string(), vec![allocation("37623", 128.0)]);

        let service = service(authority);
        let _ = service.directory.register_user(Username::new("walt")).await;

        let added = service.reconcile_memberships().await.unwrap_or_default();
        assert_eq!(added, 1);
        let members = service.directory.members(&SourceId::new("37623")).await;
        assert_eq!(members, vec![Username::new("walt")]);
    }

    #[tokio::test]
    async fn failed_user_lookup_skips_only_that_user() {
        let mut authority = StubAuthority::default();
        authority
            .accounts
            .insert("broken".to_string(), "broken".to_string());
        authority.fail_grants_for.insert("broken".to_string());
        authority
            .accounts
            .insert("walt".to_string(), "walt".to_string());
        authority
            .grants
            .insert("walt".to_string(), vec![allocation("37623", 128.0)]);

        let service = service(authority);
        let _ = service.directory.register_user(Username::new("broken")).await;
        let _ = service.directory.register_user(Username::new("walt")).await;

        let added = service.reconcile_memberships().await.unwrap_or_default();
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn missing_authority_errors_but_instance_sync_still_works() {
        let service = ReconcileService::new(
            None,
            Arc::new(SourceDirectory::new()),
            Arc::new(MaintenanceCalendar::new()),
        );

        let Err(LedgerError::AuthorityError(_)) = service.run_cycle(true).await else {
            panic!("expected AuthorityError");
        };
        assert!(service.reconcile_memberships().await.is_err());

        let report = service
            .sync_instances(vec![ObservedInstance {
                instance_id: InstanceId::new("inst-1"),
                status: InstanceStatus::Active,
            }])
            .await;
        assert_eq!(report.registered, 1);
    }

    #[tokio::test]
    async fn instance_sync_ends_updates_and_registers() {
        let service = service(StubAuthority::default());
        for id in ["inst-1", "inst-2"] {
            service
                .directory
                .record_instance(InstanceRecord {
                    instance_id: InstanceId::new(id),
                    status: InstanceStatus::Active,
                    launched_at: Utc::now(),
                    ended_at: None,
                })
                .await;
        }

        let report = service
            .sync_instances(vec![
                ObservedInstance {
                    instance_id: InstanceId::new("inst-2"),
                    status: InstanceStatus::Shelved,
                },
                ObservedInstance {
                    instance_id: InstanceId::new("inst-3"),
                    status: InstanceStatus::Active,
                },
            ])
            .await;

        assert_eq!(
            report,
            InstanceSyncReport {
                observed: 2,
                registered: 1,
                updated: 1,
                ended: 1,
            }
        );

        let gone = service.directory.instance(&InstanceId::new("inst-1")).await;
        assert!(gone.is_some_and(|record| record.is_ended()));
        let shelved = service.directory.instance(&InstanceId::new("inst-2")).await;
        assert!(shelved.is_some_and(|record| record.status == InstanceStatus::Shelved));
        let new = service.directory.instance(&InstanceId::new("inst-3")).await;
        assert!(new.is_some_and(|record| !record.is_ended()));
    }
}
