//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` pushes live tallies, check-ins and
//! catalog changes to subscribed clients and answers `get_tally` so a
//! reconnecting screen can resynchronise.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
