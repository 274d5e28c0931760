//! Domain events reflecting state mutations.
//!
//! Every state change emits a [`DomainEvent`] through the
//! [`super::EventBus`]. Event-scoped events are forwarded to WebSocket
//! subscribers; all events are optionally persisted to the PostgreSQL
//! event log and may trigger operational webhook messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::event_entry::CandidateCount;
use super::{CategoryId, EventId, InvoiceId, SubscriptionId, UserId, VoterId};

/// What part of an event's catalog changed.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogChange {
    /// Event record or settings changed.
    Event,
    /// A category was added, updated or removed.
    Category,
    /// A candidate was added, updated or removed.
    Candidate,
    /// Guests were imported or registered.
    Guests,
}

/// Domain event emitted after every state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Emitted when an event is created.
    EventCreated {
        /// Event identifier.
        event_id: EventId,
        /// Owning user.
        owner_id: UserId,
        /// Event name.
        name: String,
        /// Public event code.
        code: String,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an event is deleted.
    EventRemoved {
        /// Event identifier.
        event_id: EventId,
        /// Event name.
        name: String,
        /// Removal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when the catalog or settings of an event change.
    CatalogChanged {
        /// Event identifier.
        event_id: EventId,
        /// What changed.
        change: CatalogChange,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a guest checks in.
    GuestCheckedIn {
        /// Event identifier.
        event_id: EventId,
        /// Voter who checked in.
        voter_id: VoterId,
        /// Guest name, if known.
        name: Option<String>,
        /// Number of guests checked in so far.
        checked_in_count: u64,
        /// Check-in timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after a ballot replaced a voter's votes.
    VotesReplaced {
        /// Event identifier.
        event_id: EventId,
        /// Voter who submitted the ballot.
        voter_id: VoterId,
        /// Categories whose votes were replaced.
        category_ids: Vec<CategoryId>,
        /// Vote rows recorded by the ballot.
        votes_recorded: usize,
        /// Submission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after vote counts of a category changed.
    TallyUpdated {
        /// Event identifier.
        event_id: EventId,
        /// Category whose counts changed.
        category_id: CategoryId,
        /// Current counts for every candidate of the category.
        counts: Vec<CandidateCount>,
        /// Sum of the counts.
        total_votes: u64,
        /// Timestamp of the change.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a user account is created.
    UserRegistered {
        /// New user.
        user_id: UserId,
        /// Login email.
        email: String,
        /// Registration timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a subscription becomes active.
    SubscriptionActivated {
        /// Subscription identifier.
        subscription_id: SubscriptionId,
        /// Subscriber.
        user_id: UserId,
        /// Package code.
        package: String,
        /// Activation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an invoice is paid.
    InvoicePaid {
        /// Invoice identifier.
        invoice_id: InvoiceId,
        /// Paying user.
        user_id: UserId,
        /// Amount in VND.
        amount_vnd: u64,
        /// Payment timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Returns the event ID this domain event is scoped to, if any.
    #[must_use]
    pub const fn event_id(&self) -> Option<EventId> {
        match self {
            Self::EventCreated { event_id, .. }
            | Self::EventRemoved { event_id, .. }
            | Self::CatalogChanged { event_id, .. }
            | Self::GuestCheckedIn { event_id, .. }
            | Self::VotesReplaced { event_id, .. }
            | Self::TallyUpdated { event_id, .. } => Some(*event_id),
            Self::UserRegistered { .. }
            | Self::SubscriptionActivated { .. }
            | Self::InvoicePaid { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "event_created",
            Self::EventRemoved { .. } => "event_removed",
            Self::CatalogChanged { .. } => "catalog_changed",
            Self::GuestCheckedIn { .. } => "guest_checked_in",
            Self::VotesReplaced { .. } => "votes_replaced",
            Self::TallyUpdated { .. } => "tally_updated",
            Self::UserRegistered { .. } => "user_registered",
            Self::SubscriptionActivated { .. } => "subscription_activated",
            Self::InvoicePaid { .. } => "invoice_paid",
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::EventCreated { timestamp, .. }
            | Self::EventRemoved { timestamp, .. }
            | Self::CatalogChanged { timestamp, .. }
            | Self::GuestCheckedIn { timestamp, .. }
            | Self::VotesReplaced { timestamp, .. }
            | Self::TallyUpdated { timestamp, .. }
            | Self::UserRegistered { timestamp, .. }
            | Self::SubscriptionActivated { timestamp, .. }
            | Self::InvoicePaid { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn event_created_type_and_scope() {
        let id = EventId::new();
        let event = DomainEvent::EventCreated {
            event_id: id,
            owner_id: UserId::new(),
            name: "Gala".to_string(),
            code: "GALA26".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type_str(), "event_created");
        assert_eq!(event.event_id(), Some(id));
    }

    #[test]
    fn account_events_are_unscoped() {
        let event = DomainEvent::UserRegistered {
            user_id: UserId::new(),
            email: "host@example.vn".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_id(), None);
    }

    #[test]
    fn tally_updated_serializes_with_tag() {
        let event = DomainEvent::TallyUpdated {
            event_id: EventId::new(),
            category_id: CategoryId::new(),
            counts: Vec::new(),
            total_votes: 0,
            timestamp: Utc::now(),
        };
        let Ok(json) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"event_type\":\"tally_updated\""));
    }
}
