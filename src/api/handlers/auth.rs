//! Account handlers: sign-up, login, password and notifications.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ApiResponse, ChangePasswordRequest, LoginRequest, NotificationParams, Page, PageParams,
    SignupRequest,
};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::NotificationId;
use crate::domain::account::Notification;
use crate::error::{AppError, ErrorResponse};
use crate::service::account_service::{UserProfile, UserSession};

/// `POST /api/auth/signup` — Register an organizer.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input or a taken email.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "Auth",
    summary = "Sign up",
    description = "Creates an organizer with an active free subscription and a first event, and returns a session.",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserSession>),
        (status = 400, description = "Invalid email or weak password", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.account_service.signup(req.into()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(session))))
}

/// `POST /api/auth/login` — Sign in.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] on bad credentials.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<UserSession>),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .account_service
        .login(&req.email, &req.password)
        .await?;
    Ok(Json(ApiResponse::new(session)))
}

/// `POST /api/auth/logout` — Revoke the current session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    summary = "Log out",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    state.account_service.logout(&auth.token).await;
    StatusCode::NO_CONTENT
}

/// `GET /api/auth/me` — The signed-in user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    summary = "Current user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Signed-in user", body = ApiResponse<UserProfile>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn me(auth: AuthUser) -> impl IntoResponse {
    Json(ApiResponse::new(UserProfile::from(&auth.user)))
}

/// `POST /api/admin/change-password` — Change the password.
///
/// # Errors
///
/// Returns [`AppError`] when the current password is wrong or the new one
/// is too short.
#[utoipa::path(
    post,
    path = "/api/admin/change-password",
    tag = "Auth",
    summary = "Change password",
    description = "Verifies the current password, stores the new one and signs out every other session.",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password too short", body = ErrorResponse),
        (status = 401, description = "Current password incorrect", body = ErrorResponse),
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .account_service
        .change_password(
            &auth.user,
            &auth.token,
            &req.current_password,
            &req.new_password,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/admin/notifications` — The caller's notifications.
#[utoipa::path(
    get,
    path = "/api/admin/notifications",
    tag = "Auth",
    summary = "List notifications",
    description = "Returns the caller's notifications, newest first.",
    security(("bearer" = [])),
    params(NotificationParams),
    responses(
        (status = 200, description = "Notification page", body = ApiResponse<Page<Notification>>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<NotificationParams>,
) -> impl IntoResponse {
    let page = PageParams {
        limit: params.limit,
        offset: params.offset,
    }
    .clamped();
    let (items, total) = state
        .account_service
        .notifications(&auth.user, params.unread_only, page.limit, page.offset)
        .await;
    Json(ApiResponse::new(page.page(items, total)))
}

/// `POST /api/admin/notifications/{id}/read` — Mark a notification read.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] if the caller has no such notification.
#[utoipa::path(
    post,
    path = "/api/admin/notifications/{id}/read",
    tag = "Auth",
    summary = "Mark notification read",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Notification UUID"),
    ),
    responses(
        (status = 204, description = "Marked read"),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    )
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .account_service
        .mark_notification_read(&auth.user, NotificationId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Authentication and account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/admin/change-password", post(change_password))
        .route("/admin/notifications", get(list_notifications))
        .route("/admin/notifications/{id}/read", post(mark_notification_read))
}
