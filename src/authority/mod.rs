//! Allocation-authority API client and cache.
//!
//! The authority is the external system of record for which allocations
//! exist, how much compute each grants, and which projects a user
//! belongs to. [`HttpAuthority`] talks to it over HTTP;
//! [`AuthorityCache`] holds the fetched allocation list for the duration
//! of a reconciliation cycle.

pub mod cache;
pub mod http;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{AllocationSource, SourceId};
use crate::error::LedgerError;

pub use cache::AuthorityCache;
pub use http::HttpAuthority;

/// One allocation entry as reported by the authority.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityAllocation {
    /// Authority-assigned allocation id. The authority sends a number;
    /// it is carried as a string everywhere else.
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    /// Project charge code.
    pub project: String,
    /// Grant justification text.
    pub justification: String,
    /// Compute hours granted.
    pub compute_allocated: f64,
}

impl AuthorityAllocation {
    /// Human-readable title derived from the entry.
    #[must_use]
    pub fn title(&self) -> String {
        format!("{}: {}", self.project, self.justification)
    }

    /// Converts the entry into a local source definition.
    #[must_use]
    pub fn to_source(&self) -> AllocationSource {
        AllocationSource {
            source_id: SourceId::new(&self.id),
            name: self.title(),
            compute_allowed: Some(self.compute_allocated),
        }
    }
}

/// Read-side contract against the allocation authority.
#[async_trait]
pub trait AllocationAuthority: Send + Sync + std::fmt::Debug {
    /// Lists every allocation for the configured resource.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when the authority is
    /// unreachable or returns a malformed response.
    async fn allocations(&self) -> Result<Vec<AuthorityAllocation>, LedgerError>;

    /// Lists the allocations a user holds on the configured resource.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when the authority is
    /// unreachable or returns a malformed response.
    async fn user_allocations(
        &self,
        username: &str,
    ) -> Result<Vec<AuthorityAllocation>, LedgerError>;

    /// Resolves a local username to the authority-side account name.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when the authority has no
    /// account for this user or the lookup fails. Callers typically fall
    /// back to the local username.
    async fn resolve_username(&self, username: &str) -> Result<String, LedgerError>;
}

/// Accepts either a JSON string or number for an id field.
fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_id_becomes_a_string() {
        let entry = json!({
            "id": 37623,
            "project": "TG-ASC160018",
            "justification": "Protein folding at scale",
            "computeAllocated": 500_000,
        });
        let allocation: Option<AuthorityAllocation> = serde_json::from_value(entry).ok();
        let Some(allocation) = allocation else {
            panic!("expected entry to parse");
        };
        assert_eq!(allocation.id, "37623");
        assert_eq!(
            allocation.title(),
            "TG-ASC160018: Protein folding at scale"
        );
    }

    #[test]
    fn entry_missing_keys_fails_to_parse() {
        let entry = json!({"id": 1, "project": "TG-1"});
        let allocation: Result<AuthorityAllocation, _> = serde_json::from_value(entry);
        assert!(allocation.is_err());
    }

    #[test]
    fn to_source_carries_id_title_and_budget() {
        let allocation = AuthorityAllocation {
            id: "37623".to_string(),
            project: "TG-1".to_string(),
            justification: "trial".to_string(),
            compute_allocated: 128.0,
        };
        let source = allocation.to_source();
        assert_eq!(source.source_id.as_str(), "37623");
        assert_eq!(source.name, "TG-1: trial");
        assert_eq!(source.compute_allowed, Some(128.0));
    }
}
