//! DTOs for authentication, subscriptions and notifications.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::common_dto::double_option;
use crate::domain::account::SubscriptionStatus;
use crate::domain::account_registry::SubscriptionPatch;
use crate::service::account_service::Signup;

/// Request body for `POST /api/auth/signup`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignupRequest {
    /// Login email.
    pub email: String,
    /// Password (at least 8 characters).
    pub password: String,
    /// Display name; derived from the email when omitted.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Name of the first event created for the account.
    #[serde(default)]
    pub event_name: Option<String>,
}

impl From<SignupRequest> for Signup {
    fn from(req: SignupRequest) -> Self {
        Self {
            email: req.email,
            password: req.password,
            display_name: req.display_name,
            event_name: req.event_name,
        }
    }
}

/// Request body for `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// Request body for `POST /api/admin/change-password`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// Current password.
    pub current_password: String,
    /// New password (at least 8 characters).
    pub new_password: String,
}

/// Request body for `POST /api/subscriptions`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    /// Package code (`free`, `standard`, `premium`).
    pub package: String,
}

/// Request body for `PUT /api/subscriptions/{id}`. Omitted fields are left
/// unchanged; `null` limits mean unlimited.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    /// New status.
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    /// New events limit.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<u32>)]
    pub events_limit: Option<Option<u32>>,
    /// New participants limit.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<u32>)]
    pub participants_limit: Option<Option<u32>>,
    /// New expiry; `null` removes it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateSubscriptionRequest> for SubscriptionPatch {
    fn from(req: UpdateSubscriptionRequest) -> Self {
        Self {
            status: req.status,
            events_limit: req.events_limit,
            participants_limit: req.participants_limit,
            expires_at: req.expires_at,
        }
    }
}

/// Query parameters for `GET /api/admin/notifications`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationParams {
    /// Maximum number of items (1-200). Defaults to 50.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of items to skip.
    #[serde(default)]
    pub offset: usize,
    /// Return unread notifications only.
    #[serde(default)]
    pub unread_only: bool,
}

fn default_limit() -> usize {
    50
}
