//! Persistence layer: PostgreSQL archive of events and snapshots.
//!
//! [`PostgresArchive`] durably mirrors the in-memory event log and the
//! source snapshot store via `sqlx::PgPool`, and replays both at
//! startup. The mirroring itself runs in the background loops under
//! [`tasks`].

pub mod models;
pub mod postgres;
pub mod tasks;

pub use postgres::PostgresArchive;
