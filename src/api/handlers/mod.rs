//! REST endpoint handlers organized by resource.

pub mod auth;
pub mod billing;
pub mod catalog;
pub mod events;
pub mod guest;
pub mod system;
pub mod voters;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(billing::routes())
        .merge(events::routes())
        .merge(catalog::routes())
        .merge(voters::routes())
        .merge(guest::routes())
}
