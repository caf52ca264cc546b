//! Collaborator seams for enforcement and notification.
//!
//! The accounting engine decides *when* to act; these traits are *how*.
//! Real deployments plug in implementations that talk to the provider
//! and the mailer. The defaults here only emit structured log records,
//! which keeps the engine runnable stand-alone.

use async_trait::async_trait;

use crate::domain::{AllocationSource, SourceId, Username};
use crate::error::LedgerError;

/// Executes overage enforcement for a source (suspends its compute).
///
/// Invoked fire-and-forget: the accountant does not await the outcome,
/// and a failure is logged by the dispatch task, never retried here.
#[async_trait]
pub trait EnforcementGateway: Send + Sync + std::fmt::Debug {
    /// Requests enforcement for every resource charging this source.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::GatewayFailure`] when the downstream
    /// enforcement system rejects the request.
    async fn enforce(&self, source_id: &SourceId) -> Result<(), LedgerError>;
}

/// Delivers a usage notice to one user of a source.
#[async_trait]
pub trait NotificationGateway: Send + Sync + std::fmt::Debug {
    /// Sends a threshold notice to `username` about `source`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::GatewayFailure`] when delivery to this
    /// recipient fails. Callers isolate the failure per recipient.
    async fn send_usage_notice(
        &self,
        username: &Username,
        source: &AllocationSource,
        threshold: i64,
        actual_value: i64,
    ) -> Result<(), LedgerError>;
}

/// Enforcement stand-in that records the request in the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggedEnforcement;

#[async_trait]
impl EnforcementGateway for LoggedEnforcement {
    async fn enforce(&self, source_id: &SourceId) -> Result<(), LedgerError> {
        tracing::info!(%source_id, "enforcement requested");
        Ok(())
    }
}

/// Notification stand-in that records the notice in the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggedNotifier;

#[async_trait]
impl NotificationGateway for LoggedNotifier {
    async fn send_usage_notice(
        &self,
        username: &Username,
        source: &AllocationSource,
        threshold: i64,
        actual_value: i64,
    ) -> Result<(), LedgerError> {
        tracing::info!(
            %username,
            source_id = %source.source_id,
            threshold,
            actual_value,
            "usage notice"
        );
        Ok(())
    }
}
