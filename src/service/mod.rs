//! Service layer: business logic orchestration.
//!
//! Services acquire the per-event or account locks, apply the mutation
//! through the domain layer, and emit [`DomainEvent`]s through the
//! [`crate::domain::EventBus`] after the lock is released.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::event::Voter;
use crate::domain::{CategoryId, DomainEvent, EventEntry};

pub mod account_service;
pub mod event_service;
pub mod guest_service;
pub mod voting_service;

pub use account_service::AccountService;
pub use event_service::EventService;
pub use guest_service::GuestService;
pub use voting_service::VotingService;

/// Builds a [`DomainEvent::TallyUpdated`] with the current counts of one
/// category.
pub(crate) fn tally_updated(
    entry: &EventEntry,
    category_id: CategoryId,
    now: DateTime<Utc>,
) -> DomainEvent {
    let counts = entry.tally(Some(&BTreeSet::from([category_id])));
    let total_votes = counts.iter().map(|c| c.votes).sum();
    DomainEvent::TallyUpdated {
        event_id: entry.event.id,
        category_id,
        counts,
        total_votes,
        timestamp: now,
    }
}

/// Builds a [`DomainEvent::GuestCheckedIn`] carrying the running check-in
/// count.
pub(crate) fn checked_in_event(entry: &EventEntry, voter: &Voter, now: DateTime<Utc>) -> DomainEvent {
    let checked_in_count = entry
        .voters
        .values()
        .filter(|v| v.checked_in_at.is_some())
        .count() as u64;
    DomainEvent::GuestCheckedIn {
        event_id: entry.event.id,
        voter_id: voter.id,
        name: voter.name.clone(),
        checked_in_count,
        timestamp: now,
    }
}
