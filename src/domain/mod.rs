//! Domain layer: core types, registries, tallying and the event system.
//!
//! This module contains the server-side domain model: typed identifiers,
//! the per-event aggregate with its vote-integrity rules, results
//! ranking, the account store, and the event bus for broadcasting state
//! changes.

pub mod account;
pub mod account_registry;
pub mod domain_event;
pub mod event;
pub mod event_bus;
pub mod event_entry;
pub mod event_registry;
pub mod identity;
pub mod ids;
pub mod tally;

pub use account_registry::AccountRegistry;
pub use domain_event::DomainEvent;
pub use event_bus::EventBus;
pub use event_entry::EventEntry;
pub use event_registry::EventRegistry;
pub use ids::{
    CandidateId, CategoryId, EventId, InvoiceId, NotificationId, SubscriptionId, UserId, VoterId,
};
