//! # allocation-ledger
//!
//! Event-driven accounting service for cloud compute allocation budgets.
//!
//! External producers report usage snapshots as events; this crate
//! records them in an append-only log, keeps per-source and per-user
//! usage snapshots, watches warning thresholds and budget overage, and
//! reconciles its source catalog against an external allocation
//! authority. All accounting state lives in memory; PostgreSQL trails
//! behind it as a write-behind archive used only at startup.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── AllocationAccountant (service/)
//!     ├── ReconcileService (service/)
//!     │
//!     ├── EventLog + EventBus (domain/)
//!     ├── SnapshotStore + SourceDirectory (domain/)
//!     │
//!     ├── AllocationAuthority (authority/)
//!     └── PostgreSQL archive (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod authority;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
