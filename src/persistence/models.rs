//! Database models for the event log and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored row from the `event_log` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Event the domain event is scoped to; `None` for account events.
    pub event_id: Option<Uuid>,
    /// Event type discriminator (e.g. `"votes_replaced"`).
    pub event_type: String,
    /// JSONB payload with event-specific data.
    pub payload: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A row from the `event_snapshots` table: one whole event aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// Auto-increment row ID.
    pub id: i64,
    /// Event that was snapshotted.
    pub event_id: Uuid,
    /// Serialized event aggregate (catalog, guests, votes).
    pub state_json: serde_json::Value,
    /// Snapshot timestamp.
    pub snapshot_at: DateTime<Utc>,
}

/// A row from the `account_snapshots` table: the whole account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Auto-increment row ID.
    pub id: i64,
    /// Serialized account state.
    pub state_json: serde_json::Value,
    /// Snapshot timestamp.
    pub snapshot_at: DateTime<Utc>,
}
