//! Service layer: accounting orchestration and reconciliation.
//!
//! [`AllocationAccountant`] drives event handlers over the shared log
//! and registries; [`ReconcileService`] keeps those registries aligned
//! with the allocation authority.

pub mod accountant;
pub mod gateways;
pub mod handlers;
pub mod reconciler;

pub use accountant::{AllocationAccountant, DispatchTable, EventHandler};
pub use gateways::{EnforcementGateway, LoggedEnforcement, LoggedNotifier, NotificationGateway};
pub use reconciler::{InstanceSyncReport, ObservedInstance, ReconcileReport, ReconcileService};
