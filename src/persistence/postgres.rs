//! PostgreSQL archive of the event log and snapshot store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{StoredEvent, StoredSourceSnapshot};
use crate::config::LedgerConfig;
use crate::domain::{EventRecord, SourceSnapshot};
use crate::error::LedgerError;

/// PostgreSQL-backed archive using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresArchive {
    pool: PgPool,
}

impl PostgresArchive {
    /// Creates an archive over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from the database settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] when the database is
    /// unreachable.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Appends one event to the archive.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] on database failure.
    pub async fn save_event(&self, record: &EventRecord) -> Result<i64, LedgerError> {
        let payload = serde_json::to_value(&record.payload)
            .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (sequence, name, entity_id, payload, recorded_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(i64::try_from(record.sequence).unwrap_or(i64::MAX))
        .bind(record.name.as_str())
        .bind(&record.entity_id)
        .bind(&payload)
        .bind(record.recorded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Loads every archived event in log order.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] on database failure.
    pub async fn load_events(&self) -> Result<Vec<StoredEvent>, LedgerError> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String, serde_json::Value, DateTime<Utc>)>(
            "SELECT id, sequence, name, entity_id, payload, recorded_at \
             FROM events ORDER BY sequence ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, sequence, name, entity_id, payload, recorded_at)| StoredEvent {
                    id,
                    sequence,
                    name,
                    entity_id,
                    payload,
                    recorded_at,
                },
            )
            .collect())
    }

    /// Loads archived events converted back into log records for replay.
    /// Rows that no longer parse are skipped with a warning so one bad
    /// row cannot block startup.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] on database failure.
    pub async fn load_event_records(&self) -> Result<Vec<EventRecord>, LedgerError> {
        let stored = self.load_events().await?;
        let mut records = Vec::with_capacity(stored.len());
        for row in stored {
            let row_id = row.id;
            match row.into_record() {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(row_id, %error, "skipping unreadable archived event");
                }
            }
        }
        Ok(records)
    }

    /// Writes one archive row per snapshot, returning how many were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] on database failure.
    pub async fn save_source_snapshots(
        &self,
        snapshots: &[SourceSnapshot],
    ) -> Result<usize, LedgerError> {
        for snapshot in snapshots {
            sqlx::query(
                "INSERT INTO source_snapshots (source_id, compute_used, global_burn_rate, updated_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(snapshot.source_id.as_str())
            .bind(snapshot.compute_used)
            .bind(snapshot.global_burn_rate)
            .bind(snapshot.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;
        }
        Ok(snapshots.len())
    }

    /// Loads the newest archived snapshot for each source using
    /// `DISTINCT ON`.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] on database failure.
    pub async fn load_latest_snapshots(&self) -> Result<Vec<StoredSourceSnapshot>, LedgerError> {
        let rows = sqlx::query_as::<_, (i64, String, f64, f64, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT DISTINCT ON (source_id) id, source_id, compute_used, global_burn_rate, updated_at, snapshot_at \
             FROM source_snapshots ORDER BY source_id, snapshot_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, source_id, compute_used, global_burn_rate, updated_at, snapshot_at)| {
                    StoredSourceSnapshot {
                        id,
                        source_id,
                        compute_used,
                        global_burn_rate,
                        updated_at,
                        snapshot_at,
                    }
                },
            )
            .collect())
    }

    /// Deletes archived events older than the given number of days.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] on database failure.
    pub async fn delete_events_before(&self, before_days: u64) -> Result<u64, LedgerError> {
        let cutoff =
            Utc::now() - chrono::Duration::days(i64::try_from(before_days).unwrap_or(i64::MAX));

        let result = sqlx::query("DELETE FROM events WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Deletes archived snapshots older than the given number of days.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError::PersistenceError`] on database failure.
    pub async fn delete_snapshots_before(&self, before_days: u64) -> Result<u64, LedgerError> {
        let cutoff =
            Utc::now() - chrono::Duration::days(i64::try_from(before_days).unwrap_or(i64::MAX));

        let result = sqlx::query("DELETE FROM source_snapshots WHERE snapshot_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
