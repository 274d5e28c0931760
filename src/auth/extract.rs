//! Axum extractors resolving the `Authorization: Bearer` header.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::session::Principal;
use crate::app_state::AppState;
use crate::domain::account::User;
use crate::domain::{EventId, VoterId};
use crate::error::AppError;

/// An authenticated organizer or admin.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The signed-in user.
    pub user: User,
    /// The bearer token used for the request.
    pub token: String,
}

/// An authenticated guest of one event.
#[derive(Debug, Clone)]
pub struct AuthVoter {
    /// Event the voter belongs to.
    pub event_id: EventId,
    /// The voter.
    pub voter_id: VoterId,
    /// The bearer token used for the request.
    pub token: String,
}

fn bearer_token(parts: &Parts) -> Result<String, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let Principal::User { user_id } = state.sessions.resolve(&token).await? else {
            return Err(AppError::Unauthorized(
                "voter sessions cannot use admin routes".to_string(),
            ));
        };
        let Ok(user) = state.account_service.user(user_id).await else {
            // The account vanished (e.g. a snapshot restore); drop the session.
            state.sessions.revoke(&token).await;
            tracing::debug!(%user_id, "session revoked for missing user");
            return Err(AppError::Unauthorized("unknown user".to_string()));
        };
        Ok(Self { user, token })
    }
}

impl FromRequestParts<AppState> for AuthVoter {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        match state.sessions.resolve(&token).await? {
            Principal::Voter { event_id, voter_id } => Ok(Self {
                event_id,
                voter_id,
                token,
            }),
            Principal::User { .. } => Err(AppError::Unauthorized(
                "a guest session is required".to_string(),
            )),
        }
    }
}
