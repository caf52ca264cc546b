//! Cycle-scoped cache of the authority's allocation listing.
//!
//! Reconciliation touches the full allocation list several times per
//! cycle. The cache keeps one fetched copy so a cycle costs a single
//! listing call, and is explicitly invalidated when fresh data is
//! needed rather than expiring on its own.

use tokio::sync::RwLock;

use crate::error::LedgerError;

use super::{AllocationAuthority, AuthorityAllocation};

/// Holds the last fetched allocation listing.
#[derive(Debug, Default)]
pub struct AuthorityCache {
    allocations: RwLock<Option<Vec<AuthorityAllocation>>>,
}

impl AuthorityCache {
    /// Creates an empty (cold) cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a listing has been fetched since the last invalidation.
    pub async fn is_warm(&self) -> bool {
        self.allocations.read().await.is_some()
    }

    /// Drops the cached listing so the next read fetches fresh data.
    pub async fn invalidate(&self) {
        *self.allocations.write().await = None;
    }

    /// Fetches the listing from the authority and replaces the cached
    /// copy, returning the number of entries fetched.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when the listing call
    /// fails; the previously cached copy is left in place.
    pub async fn refresh(
        &self,
        authority: &dyn AllocationAuthority,
    ) -> Result<usize, LedgerError> {
        let fetched = authority.allocations().await?;
        let count = fetched.len();
        *self.allocations.write().await = Some(fetched);
        Ok(count)
    }

    /// Returns the cached listing, fetching it first if the cache is
    /// cold.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when the cache is cold
    /// and the listing call fails.
    pub async fn ensure(
        &self,
        authority: &dyn AllocationAuthority,
    ) -> Result<Vec<AuthorityAllocation>, LedgerError> {
        if let Some(cached) = self.allocations.read().await.as_ref() {
            return Ok(cached.clone());
        }
        self.refresh(authority).await?;
        Ok(self
            .allocations
            .read()
            .await
            .as_ref()
            .cloned()
            .unwrap_or_default())
    }

    /// Looks up a cached allocation by authority id. Returns `None`
    /// when the cache is cold or the id is unknown.
    pub async fn allocation(&self, id: &str) -> Option<AuthorityAllocation> {
        self.allocations
            .read()
            .await
            .as_ref()
            .and_then(|list| list.iter().find(|a| a.id == id).cloned())
    }
}
