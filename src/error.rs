//! Application error types with HTTP status code mapping.
//!
//! [`AppError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and a structured JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: category allows at most 1 vote(s)",
///     "retry_after_ms": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see ranges on [`AppError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Milliseconds until the client may retry, for rate-limited calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category           | HTTP Status                  |
/// |-----------|--------------------|------------------------------|
/// | 1000–1999 | Validation         | 400 Bad Request              |
/// | 2000–2999 | Not Found/Conflict | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server             | 500 Internal Server Error    |
/// | 4000–4999 | Access             | 401 / 403 / 429              |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Phone number could not be normalized.
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    /// Voting is not open for the event.
    #[error("voting is closed for event {0}")]
    VotingClosed(uuid::Uuid),

    /// Event with the given ID or code was not found.
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// Category was not found in the event.
    #[error("category not found: {0}")]
    CategoryNotFound(uuid::Uuid),

    /// Candidate was not found in the event.
    #[error("candidate not found: {0}")]
    CandidateNotFound(uuid::Uuid),

    /// Voter was not found in the event.
    #[error("voter not found: {0}")]
    VoterNotFound(uuid::Uuid),

    /// Generic missing resource (users, subscriptions, invoices, ...).
    #[error("{0} not found")]
    NotFound(String),

    /// Operation conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Webhook or other outbound delivery failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Missing, expired or malformed credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated principal may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Subscription quota would be exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Client exceeded rate limit.
    #[error("rate limit exceeded; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the client may retry.
        retry_after_ms: u64,
    },
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidPhone(_) => 1002,
            Self::VotingClosed(_) => 1003,
            Self::EventNotFound(_) => 2001,
            Self::CategoryNotFound(_) => 2002,
            Self::CandidateNotFound(_) => 2003,
            Self::VoterNotFound(_) => 2004,
            Self::NotFound(_) => 2005,
            Self::Conflict(_) => 2009,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Delivery(_) => 3002,
            Self::Unauthorized(_) => 4001,
            Self::Forbidden(_) => 4003,
            Self::LimitExceeded(_) => 4004,
            Self::RateLimited { .. } => 4029,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidPhone(_) | Self::VotingClosed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::EventNotFound(_)
            | Self::CategoryNotFound(_)
            | Self::CandidateNotFound(_)
            | Self::VoterNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Delivery(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::LimitExceeded(_) => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let retry_after_ms = match &self {
            Self::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                retry_after_ms,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = AppError::InvalidRequest("too many candidates".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1001);
    }

    #[test]
    fn limit_exceeded_is_forbidden() {
        let err = AppError::LimitExceeded("events".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn rate_limited_response_carries_retry_hint() {
        let response = AppError::RateLimited {
            retry_after_ms: 1500,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
