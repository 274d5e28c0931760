//! Background persistence tasks: event-log writer, snapshotter, cleanup,
//! and startup restore.
//!
//! The in-memory registries stay authoritative; these tasks only mirror
//! them to PostgreSQL. Database failures are logged and the task carries
//! on with the next event or tick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::postgres::PostgresPersistence;
use crate::domain::account_registry::AccountState;
use crate::domain::{AccountRegistry, DomainEvent, EventEntry, EventId, EventRegistry};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Counts of restored state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Events loaded into the registry.
    pub events: usize,
    /// Snapshot rows that could not be decoded.
    pub skipped: usize,
    /// Whether an account snapshot was applied.
    pub accounts: bool,
}

/// Loads the latest snapshots into empty registries.
///
/// # Errors
///
/// Returns an error if the snapshots cannot be read. Rows that fail to
/// decode are skipped and counted.
pub async fn restore(
    store: &PostgresPersistence,
    events: &EventRegistry,
    accounts: &AccountRegistry,
) -> anyhow::Result<RestoreReport> {
    let mut report = RestoreReport::default();

    if let Some(snapshot) = store
        .load_latest_account_snapshot()
        .await
        .context("loading account snapshot")?
    {
        let state: AccountState = serde_json::from_value(snapshot.state_json)
            .context("decoding account snapshot")?;
        accounts.restore(state).await;
        report.accounts = true;
    }

    let snapshots = store
        .load_latest_event_snapshots()
        .await
        .context("loading event snapshots")?;
    for snapshot in snapshots {
        match serde_json::from_value::<EventEntry>(snapshot.state_json) {
            Ok(entry) => {
                events.restore(entry).await;
                report.events += 1;
            }
            Err(err) => {
                tracing::error!(event_id = %snapshot.event_id, error = %err, "undecodable event snapshot");
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

/// Spawns the bus subscriber that appends domain events to the event log
/// (when `log_enabled`) and drops snapshots of removed events.
pub fn spawn_event_log_writer(
    store: PostgresPersistence,
    mut event_rx: broadcast::Receiver<DomainEvent>,
    log_enabled: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if let Err(err) = record_event(&store, &event, log_enabled).await {
                        tracing::error!(
                            event_type = event.event_type_str(),
                            error = %err,
                            "failed to persist domain event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event log writer lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("event log writer stopped");
    })
}

async fn record_event(
    store: &PostgresPersistence,
    event: &DomainEvent,
    log_enabled: bool,
) -> anyhow::Result<()> {
    let event_id = event.event_id().map(uuid::Uuid::from);
    if log_enabled {
        let payload = serde_json::to_value(event).context("encoding domain event")?;
        store
            .save_event(event_id, event.event_type_str(), &payload, event.timestamp())
            .await?;
    }
    if let (DomainEvent::EventRemoved { .. }, Some(event_id)) = (event, event_id) {
        let removed = store.delete_event_snapshots(event_id).await?;
        tracing::debug!(%event_id, removed, "snapshots of removed event deleted");
    }
    Ok(())
}

/// Remembers what was last written so unchanged state is not re-saved.
#[derive(Debug, Default)]
pub struct Snapshotter {
    saved_events: HashMap<EventId, DateTime<Utc>>,
    saved_accounts: Option<serde_json::Value>,
}

impl Snapshotter {
    /// Creates a snapshotter that has written nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks restored state as already saved.
    pub async fn seed(&mut self, events: &EventRegistry, accounts: &AccountRegistry) {
        for entry in events.snapshot_all().await {
            self.saved_events
                .insert(entry.event.id, entry.last_modified_at);
        }
        self.saved_accounts = serde_json::to_value(accounts.snapshot().await).ok();
    }

    /// Writes snapshots of every event modified since its last snapshot,
    /// and of the account store when it changed. Returns the number of
    /// rows written.
    ///
    /// # Errors
    ///
    /// Returns the first database or encoding error; events written before
    /// it stay recorded.
    pub async fn run_once(
        &mut self,
        store: &PostgresPersistence,
        events: &EventRegistry,
        accounts: &AccountRegistry,
    ) -> anyhow::Result<usize> {
        let mut written = 0;
        let entries = events.snapshot_all().await;
        let live: HashSet<EventId> = entries.iter().map(|e| e.event.id).collect();

        for entry in entries {
            let id = entry.event.id;
            if self
                .saved_events
                .get(&id)
                .is_some_and(|saved| *saved >= entry.last_modified_at)
            {
                continue;
            }
            let state = serde_json::to_value(&entry).context("encoding event snapshot")?;
            store.save_event_snapshot(id.into(), &state).await?;
            self.saved_events.insert(id, entry.last_modified_at);
            written += 1;
        }
        self.saved_events.retain(|id, _| live.contains(id));

        let state =
            serde_json::to_value(accounts.snapshot().await).context("encoding account snapshot")?;
        if self.saved_accounts.as_ref() != Some(&state) {
            store.save_account_snapshot(&state).await?;
            self.saved_accounts = Some(state);
            written += 1;
        }
        Ok(written)
    }
}

/// Spawns the periodic snapshot task.
pub fn spawn_snapshotter(
    store: PostgresPersistence,
    events: Arc<EventRegistry>,
    accounts: Arc<AccountRegistry>,
    mut snapshotter: Snapshotter,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match snapshotter.run_once(&store, &events, &accounts).await {
                Ok(0) => {}
                Ok(written) => tracing::debug!(written, "snapshots saved"),
                Err(err) => tracing::error!(error = %err, "snapshot pass failed"),
            }
        }
    })
}

/// Spawns the task pruning old snapshots and log entries.
pub fn spawn_cleanup(store: PostgresPersistence, after_days: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match store.delete_old_snapshots(after_days).await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, after_days, "old persistence rows pruned"),
                Err(err) => tracing::error!(error = %err, "persistence cleanup failed"),
            }
        }
    })
}
