//! Concurrent event storage with per-event fine-grained locking.
//!
//! [`EventRegistry`] stores all events in a `HashMap` where each entry is
//! individually protected by a [`tokio::sync::RwLock`]. A second map
//! resolves public event codes to IDs for the guest-facing routes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::event_entry::EventEntry;
use super::{EventId, UserId};
use crate::error::AppError;

/// Lightweight summary of an event for list endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventSummary {
    /// Event identifier.
    pub event_id: EventId,
    /// Event name.
    pub name: String,
    /// Public event code.
    pub code: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Whether the event is active.
    pub is_active: bool,
    /// Number of categories.
    pub category_count: usize,
    /// Number of registered voters.
    pub voter_count: usize,
    /// Number of votes cast.
    pub vote_count: usize,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&EventEntry> for EventSummary {
    fn from(entry: &EventEntry) -> Self {
        Self {
            event_id: entry.event.id,
            name: entry.event.name.clone(),
            code: entry.event.code.clone(),
            owner_id: entry.event.owner_id,
            is_active: entry.event.is_active,
            category_count: entry.categories.len(),
            voter_count: entry.voters.len(),
            vote_count: entry.votes.len(),
            created_at: entry.event.created_at,
        }
    }
}

/// Central store for all events.
///
/// # Concurrency
///
/// - Multiple tasks may read the same event concurrently.
/// - Writes to different events are concurrent.
/// - Writes to the same event are serialized.
#[derive(Debug, Default)]
pub struct EventRegistry {
    events: RwLock<HashMap<EventId, Arc<RwLock<EventEntry>>>>,
    codes: RwLock<HashMap<String, EventId>>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new event entry into the registry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the ID or the code is already taken.
    pub async fn insert(&self, entry: EventEntry) -> Result<EventId, AppError> {
        let event_id = entry.event.id;
        let code = entry.event.code.clone();
        let mut map = self.events.write().await;
        let mut codes = self.codes.write().await;
        if map.contains_key(&event_id) {
            return Err(AppError::Conflict(format!("event {event_id} already exists")));
        }
        if codes.contains_key(&code) {
            return Err(AppError::Conflict(format!("event code {code} already in use")));
        }
        codes.insert(code, event_id);
        map.insert(event_id, Arc::new(RwLock::new(entry)));
        Ok(event_id)
    }

    /// Returns `true` if an event already uses `code`.
    pub async fn code_in_use(&self, code: &str) -> bool {
        self.codes.read().await.contains_key(code)
    }

    /// Returns the event entry behind its per-event lock.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] if no event with the given ID
    /// exists.
    pub async fn get(&self, event_id: EventId) -> Result<Arc<RwLock<EventEntry>>, AppError> {
        let map = self.events.read().await;
        map.get(&event_id)
            .cloned()
            .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))
    }

    /// Resolves a public event code to its entry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] if the code is unknown.
    pub async fn get_by_code(&self, code: &str) -> Result<Arc<RwLock<EventEntry>>, AppError> {
        let event_id = self
            .codes
            .read()
            .await
            .get(code)
            .copied()
            .ok_or_else(|| AppError::EventNotFound(code.to_string()))?;
        self.get(event_id).await
    }

    /// Removes an event from the registry, returning its entry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] if no event with the given ID
    /// exists.
    pub async fn remove(&self, event_id: EventId) -> Result<EventEntry, AppError> {
        let mut map = self.events.write().await;
        let arc = map
            .remove(&event_id)
            .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))?;
        // Handlers may still hold a clone of the Arc; take a copy of the
        // state instead of requiring sole ownership.
        let entry = arc.read().await.clone();
        self.codes.write().await.remove(&entry.event.code);
        Ok(entry)
    }

    /// Returns summaries of all events, optionally filtered by owner,
    /// newest first.
    pub async fn list(&self, owner_filter: Option<UserId>) -> Vec<EventSummary> {
        let map = self.events.read().await;
        let mut summaries = Vec::with_capacity(map.len());
        for entry_lock in map.values() {
            let entry = entry_lock.read().await;
            if let Some(owner) = owner_filter
                && entry.event.owner_id != owner
            {
                continue;
            }
            summaries.push(EventSummary::from(&*entry));
        }
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        summaries
    }

    /// Returns a point-in-time copy of every entry, for snapshots.
    pub async fn snapshot_all(&self) -> Vec<EventEntry> {
        let locks: Vec<Arc<RwLock<EventEntry>>> =
            self.events.read().await.values().cloned().collect();
        let mut entries = Vec::with_capacity(locks.len());
        for lock in locks {
            entries.push(lock.read().await.clone());
        }
        entries
    }

    /// Replaces or inserts an entry restored from a snapshot.
    pub async fn restore(&self, entry: EventEntry) {
        let event_id = entry.event.id;
        let code = entry.event.code.clone();
        self.codes.write().await.insert(code, event_id);
        self.events
            .write()
            .await
            .insert(event_id, Arc::new(RwLock::new(entry)));
    }

    /// Returns the number of events in the registry.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns `true` if the registry contains no events.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event_entry::tests::make_entry;

    #[tokio::test]
    async fn insert_and_get() {
        let registry = EventRegistry::new();
        let entry = make_entry();
        let id = entry.event.id;
        let Ok(inserted) = registry.insert(entry).await else {
            panic!("insert failed");
        };
        assert_eq!(inserted, id);
        assert!(registry.get(id).await.is_ok());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn lookup_by_code() {
        let registry = EventRegistry::new();
        let entry = make_entry();
        let id = entry.event.id;
        let code = entry.event.code.clone();
        assert!(registry.insert(entry).await.is_ok());

        let Ok(lock) = registry.get_by_code(&code).await else {
            panic!("code lookup failed");
        };
        assert_eq!(lock.read().await.event.id, id);
        assert!(registry.get_by_code("NOPE00").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_code_is_a_conflict() {
        let registry = EventRegistry::new();
        assert!(registry.insert(make_entry()).await.is_ok());
        assert!(matches!(
            registry.insert(make_entry()).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn remove_frees_code() {
        let registry = EventRegistry::new();
        let entry = make_entry();
        let id = entry.event.id;
        let code = entry.event.code.clone();
        assert!(registry.insert(entry).await.is_ok());

        assert!(registry.remove(id).await.is_ok());
        assert!(registry.is_empty().await);
        assert!(!registry.code_in_use(&code).await);
        assert!(matches!(
            registry.remove(id).await,
            Err(AppError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_owner() {
        let registry = EventRegistry::new();
        let mine = make_entry();
        let owner = mine.event.owner_id;
        let mut theirs = make_entry();
        theirs.event.code = "OTHER1".to_string();
        assert!(registry.insert(mine).await.is_ok());
        assert!(registry.insert(theirs).await.is_ok());

        assert_eq!(registry.list(None).await.len(), 2);
        let filtered = registry.list(Some(owner)).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.first().map(|s| s.owner_id), Some(owner));
    }
}
