//! HTTP client for the allocation authority.
//!
//! Every authority endpoint wraps its payload in a `{status, result}`
//! envelope; a response whose status is not `success` is treated as a
//! failure regardless of the HTTP status code.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LedgerError;

use super::{AllocationAuthority, AuthorityAllocation};

/// Client for the authority's REST API.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base_url: String,
    resource_name: String,
}

impl HttpAuthority {
    /// Builds a client rooted at `base_url` that only considers
    /// allocations for `resource_name`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AuthorityError`] when the underlying HTTP
    /// client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        resource_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                LedgerError::AuthorityError(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            resource_name: resource_name.into(),
        })
    }

    /// Resource name this client filters allocations by.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    async fn get_result(&self, path: &str) -> Result<Value, LedgerError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await.map_err(|error| {
            LedgerError::AuthorityError(format!("request to {url} failed: {error}"))
        })?;
        let body: Value = response.json().await.map_err(|error| {
            LedgerError::AuthorityError(format!("non-JSON response from {url}: {error}"))
        })?;
        unwrap_envelope(&body)
    }
}

#[async_trait]
impl AllocationAuthority for HttpAuthority {
    async fn allocations(&self) -> Result<Vec<AuthorityAllocation>, LedgerError> {
        let path = format!("/v1/allocations/resource/{}", self.resource_name);
        let result = self.get_result(&path).await?;
        serde_json::from_value(result).map_err(|error| {
            LedgerError::AuthorityError(format!("malformed allocation listing: {error}"))
        })
    }

    async fn user_allocations(
        &self,
        username: &str,
    ) -> Result<Vec<AuthorityAllocation>, LedgerError> {
        let path = format!("/v1/projects/username/{username}");
        let result = self.get_result(&path).await?;
        parse_project_allocations(&result, &self.resource_name)
    }

    async fn resolve_username(&self, username: &str) -> Result<String, LedgerError> {
        let path = format!("/v1/users/federated/{username}");
        let result = self.get_result(&path).await?;
        match result {
            Value::String(name) if !name.is_empty() => Ok(name),
            other => Err(LedgerError::AuthorityError(format!(
                "no authority account for {username}: {other}"
            ))),
        }
    }
}

/// Validates the `{status, result}` envelope and extracts `result`.
fn unwrap_envelope(body: &Value) -> Result<Value, LedgerError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::AuthorityError("response missing status field".to_string()))?;
    if status != "success" {
        return Err(LedgerError::AuthorityError(format!(
            "authority reported status {status}"
        )));
    }
    body.get("result").cloned().ok_or_else(|| {
        LedgerError::AuthorityError("response missing result field".to_string())
    })
}

/// Flattens a project listing into the allocations granted on
/// `resource_name`. Allocation entries for other resources are ignored
/// without being parsed.
fn parse_project_allocations(
    result: &Value,
    resource_name: &str,
) -> Result<Vec<AuthorityAllocation>, LedgerError> {
    let projects = result.as_array().ok_or_else(|| {
        LedgerError::AuthorityError("project listing is not an array".to_string())
    })?;
    let mut allocations = Vec::new();
    for project in projects {
        let Some(entries) = project.get("allocations").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            if entry.get("resource").and_then(Value::as_str) != Some(resource_name) {
                continue;
            }
            let allocation =
                serde_json::from_value(entry.clone()).map_err(|error| {
                    LedgerError::AuthorityError(format!("malformed allocation entry: {error}"))
                })?;
            allocations.push(allocation);
        }
    }
    Ok(allocations)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_with_success_status_yields_result() {
        let body = json!({"status": "success", "result": [1, 2, 3]});
        let Ok(result) = unwrap_envelope(&body) else {
            panic!("expected envelope to validate");
        };
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[test]
    fn envelope_with_error_status_is_rejected() {
        let body = json!({"status": "error", "result": []});
        assert!(unwrap_envelope(&body).is_err());
    }

    #[test]
    fn envelope_missing_fields_is_rejected() {
        assert!(unwrap_envelope(&json!({"result": []})).is_err());
        assert!(unwrap_envelope(&json!({"status": "success"})).is_err());
    }

    #[test]
    fn project_listing_filters_by_resource() {
        let result = json!([
            {
                "chargeCode": "TG-1",
                "allocations": [
                    {
                        "id": 10,
                        "project": "TG-1",
                        "justification": "one",
                        "computeAllocated": 100,
                        "resource": "cloud"
                    },
                    {"id": 11, "resource": "hpc"}
                ]
            },
            {"chargeCode": "TG-2"}
        ]);
        let Ok(allocations) = parse_project_allocations(&result, "cloud") else {
            panic!("expected listing to parse");
        };
        assert_eq!(allocations.len(), 1);
        assert_eq!(
            allocations.first().map(|a| a.id.as_str()),
            Some("10")
        );
    }

    #[test]
    fn malformed_entry_on_the_resource_is_an_error() {
        let result = json!([
            {"allocations": [{"id": 10, "resource": "cloud"}]}
        ]);
        assert!(parse_project_allocations(&result, "cloud").is_err());
    }
}
