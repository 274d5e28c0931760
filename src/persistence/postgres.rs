//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{AccountSnapshot, EventSnapshot, StoredEvent};
use crate::config::AppConfig;
use crate::error::AppError;

/// Upper bound for retention windows, keeping the cutoff representable.
const MAX_RETENTION_DAYS: i64 = 36_500;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    /// Appends a domain event to the event log.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn save_event(
        &self,
        event_id: Option<Uuid>,
        event_type: &str,
        payload: &serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO event_log (event_id, event_type, payload, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Saves a snapshot of one event aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn save_event_snapshot(
        &self,
        event_id: Uuid,
        state_json: &serde_json::Value,
    ) -> Result<i64, AppError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO event_snapshots (event_id, state_json) VALUES ($1, $2) RETURNING id",
        )
        .bind(event_id)
        .bind(state_json)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Saves a snapshot of the account store.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn save_account_snapshot(
        &self,
        state_json: &serde_json::Value,
    ) -> Result<i64, AppError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO account_snapshots (state_json) VALUES ($1) RETURNING id",
        )
        .bind(state_json)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Loads the latest snapshot for each event using `DISTINCT ON`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn load_latest_event_snapshots(&self) -> Result<Vec<EventSnapshot>, AppError> {
        let rows = sqlx::query_as::<_, (i64, Uuid, serde_json::Value, DateTime<Utc>)>(
            "SELECT DISTINCT ON (event_id) id, event_id, state_json, snapshot_at \
             FROM event_snapshots ORDER BY event_id, snapshot_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, event_id, state_json, snapshot_at)| EventSnapshot {
                id,
                event_id,
                state_json,
                snapshot_at,
            })
            .collect())
    }

    /// Loads the most recent account snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn load_latest_account_snapshot(&self) -> Result<Option<AccountSnapshot>, AppError> {
        let row = sqlx::query_as::<_, (i64, serde_json::Value, DateTime<Utc>)>(
            "SELECT id, state_json, snapshot_at FROM account_snapshots \
             ORDER BY snapshot_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, state_json, snapshot_at)| AccountSnapshot {
            id,
            state_json,
            snapshot_at,
        }))
    }

    /// Loads log entries after the given timestamp, optionally filtered by
    /// event ID.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn load_events_after(
        &self,
        after: DateTime<Utc>,
        event_id: Option<Uuid>,
    ) -> Result<Vec<StoredEvent>, AppError> {
        let rows = if let Some(eid) = event_id {
            sqlx::query_as::<_, (i64, Option<Uuid>, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, event_id, event_type, payload, created_at FROM event_log \
                 WHERE created_at > $1 AND event_id = $2 ORDER BY created_at ASC, id ASC",
            )
            .bind(after)
            .bind(eid)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, (i64, Option<Uuid>, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, event_id, event_type, payload, created_at FROM event_log \
                 WHERE created_at > $1 ORDER BY created_at ASC, id ASC",
            )
            .bind(after)
            .fetch_all(&self.pool)
            .await
        }?;

        Ok(rows
            .into_iter()
            .map(
                |(id, event_id, event_type, payload, created_at)| StoredEvent {
                    id,
                    event_id,
                    event_type,
                    payload,
                    created_at,
                },
            )
            .collect())
    }

    /// Deletes every snapshot of a removed event so it is not restored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn delete_event_snapshots(&self, event_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM event_snapshots WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes snapshots and log entries older than the given number of
    /// days. The latest snapshot of every event and of the account store is
    /// always kept.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on database failure.
    pub async fn delete_old_snapshots(&self, before_days: u64) -> Result<u64, AppError> {
        let days = i64::try_from(before_days).unwrap_or(MAX_RETENTION_DAYS).min(MAX_RETENTION_DAYS);
        let cutoff = Utc::now() - chrono::Duration::days(days);

        let events = sqlx::query(
            "DELETE FROM event_snapshots s WHERE s.snapshot_at < $1 AND EXISTS ( \
                 SELECT 1 FROM event_snapshots n \
                 WHERE n.event_id = s.event_id AND n.snapshot_at > s.snapshot_at)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let accounts = sqlx::query(
            "DELETE FROM account_snapshots WHERE snapshot_at < $1 \
             AND snapshot_at < (SELECT max(snapshot_at) FROM account_snapshots)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let log = sqlx::query("DELETE FROM event_log WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(events.rows_affected() + accounts.rows_affected() + log.rows_affected())
    }
}
