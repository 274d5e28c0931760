//! # bright4event
//!
//! REST API and WebSocket backend for event check-in, live audience voting
//! and results.
//!
//! Organizers create events with award categories and candidates, import a
//! guest list and open voting. Guests authenticate by phone number or access
//! code (optionally confirmed by OTP), check in by QR scan and submit
//! ballots. Ballots replace the voter's previous picks per category and are
//! capped server-side by each category's `max_votes_per_voter`. Live tallies
//! are pushed to LED screens over WebSocket.
//!
//! ## Architecture
//!
//! ```text
//! Clients (admin console, guest phones, LED screens)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── EventService / VotingService / GuestService / AccountService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── EventRegistry / AccountRegistry (domain/)
//!     │
//!     ├── PostgreSQL Persistence (persistence/)
//!     └── Discord Notifier (notify/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod service;
pub mod ws;
