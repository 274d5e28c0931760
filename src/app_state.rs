//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::SessionStore;
use crate::config::AppConfig;
use crate::domain::{AccountRegistry, EventBus, EventRegistry};
use crate::service::guest_service::OtpPolicy;
use crate::service::{AccountService, EventService, GuestService, VotingService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runtime configuration.
    pub config: Arc<AppConfig>,
    /// Events, catalog, guest list and results.
    pub event_service: Arc<EventService>,
    /// Ballots and live tallies.
    pub voting_service: Arc<VotingService>,
    /// Guest authentication, OTP and check-in.
    pub guest_service: Arc<GuestService>,
    /// Accounts, subscriptions, invoices and notifications.
    pub account_service: Arc<AccountService>,
    /// Bearer sessions of users and voters.
    pub sessions: Arc<SessionStore>,
    /// Event bus for WebSocket subscriptions and background workers.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires registries and services from the configuration.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let events = Arc::new(EventRegistry::new());
        let accounts = Arc::new(AccountRegistry::new());
        let sessions = Arc::new(match &config.session_secret {
            Some(secret) => SessionStore::with_secret(config.session_ttl_secs, secret.as_bytes()),
            None => SessionStore::new(config.session_ttl_secs),
        });
        let event_bus = EventBus::new(config.event_bus_capacity);

        let event_service = Arc::new(EventService::new(
            Arc::clone(&events),
            Arc::clone(&accounts),
            Arc::clone(&sessions),
            event_bus.clone(),
        ));
        let voting_service = Arc::new(VotingService::new(Arc::clone(&events), event_bus.clone()));
        let guest_service = Arc::new(GuestService::new(
            events,
            Arc::clone(&sessions),
            event_bus.clone(),
            OtpPolicy::from_config(&config),
        ));
        let account_service = Arc::new(AccountService::new(
            accounts,
            Arc::clone(&event_service),
            Arc::clone(&sessions),
            event_bus.clone(),
        )
        .with_hash_cost(config.password_hash_cost));

        Self {
            config: Arc::new(config),
            event_service,
            voting_service,
            guest_service,
            account_service,
            sessions,
            event_bus,
        }
    }
}
