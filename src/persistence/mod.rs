//! Persistence layer: PostgreSQL event log and state snapshots.
//!
//! Every domain event can be appended to the `event_log` table, and the
//! event and account registries are periodically snapshotted. On startup
//! the latest snapshots are restored. The concrete implementation uses
//! `sqlx::PgPool` for async PostgreSQL access.

pub mod models;
pub mod postgres;
pub mod worker;

pub use postgres::PostgresPersistence;
