//! Outbound operational notifications.
//!
//! A bus subscriber turns account and event lifecycle changes into short
//! messages for the operators' Discord channel. Delivery is best-effort:
//! failures are logged and never affect the request that caused them.

pub mod discord;

pub use discord::DiscordNotifier;
