//! Subscription and invoice handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, CreateSubscriptionRequest, UpdateSubscriptionRequest};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::account::{Invoice, Subscription};
use crate::domain::{InvoiceId, SubscriptionId};
use crate::error::{AppError, ErrorResponse};
use crate::service::account_service::SubscriptionOrder;

/// `GET /api/subscriptions` — List subscriptions.
#[utoipa::path(
    get,
    path = "/api/subscriptions",
    tag = "Billing",
    summary = "List subscriptions",
    description = "Returns the caller's subscriptions, newest first. Admins see every subscription.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Subscriptions", body = ApiResponse<Vec<Subscription>>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> impl IntoResponse {
    let subs = state.account_service.list_subscriptions(&auth.user).await;
    Json(ApiResponse::new(subs))
}

/// `POST /api/subscriptions` — Subscribe to a package.
///
/// # Errors
///
/// Returns [`AppError`] for an unknown package or when a free package cannot
/// hold the events already created.
#[utoipa::path(
    post,
    path = "/api/subscriptions",
    tag = "Billing",
    summary = "Subscribe to a package",
    description = "Free packages activate immediately. Paid packages create a pending subscription and a pending invoice.",
    security(("bearer" = [])),
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = ApiResponse<SubscriptionOrder>),
        (status = 400, description = "Unknown package", body = ErrorResponse),
        (status = 409, description = "Package too small for current usage", body = ErrorResponse),
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .account_service
        .open_subscription(&auth.user, &req.package)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(order))))
}

/// `GET /api/subscriptions/{id}` — Get a subscription.
///
/// # Errors
///
/// Returns [`AppError`] if the subscription does not exist or belongs to
/// another user.
#[utoipa::path(
    get,
    path = "/api/subscriptions/{id}",
    tag = "Billing",
    summary = "Get subscription",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Subscription UUID"),
    ),
    responses(
        (status = 200, description = "Subscription", body = ApiResponse<Subscription>),
        (status = 403, description = "Another user's subscription", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sub = state
        .account_service
        .get_subscription(&auth.user, SubscriptionId::from_uuid(id))
        .await?;
    Ok(Json(ApiResponse::new(sub)))
}

/// `PUT /api/subscriptions/{id}` — Admin change of status or limits.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins and
/// [`AppError::Conflict`] when `events_limit` would drop below
/// `events_used`.
#[utoipa::path(
    put,
    path = "/api/subscriptions/{id}",
    tag = "Billing",
    summary = "Update subscription",
    description = "Admin only. Changes status, limits or expiry; `events_limit` can never drop below `events_used`.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Subscription UUID"),
    ),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "Subscription updated", body = ApiResponse<Subscription>),
        (status = 403, description = "Admin required", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
        (status = 409, description = "Limit below usage", body = ErrorResponse),
    )
)]
pub async fn update_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sub = state
        .account_service
        .update_subscription(&auth.user, SubscriptionId::from_uuid(id), req.into())
        .await?;
    Ok(Json(ApiResponse::new(sub)))
}

/// `DELETE /api/subscriptions/{id}` — Cancel a subscription.
///
/// # Errors
///
/// Returns [`AppError`] if the subscription does not exist or belongs to
/// another user.
#[utoipa::path(
    delete,
    path = "/api/subscriptions/{id}",
    tag = "Billing",
    summary = "Cancel subscription",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Subscription UUID"),
    ),
    responses(
        (status = 200, description = "Subscription cancelled", body = ApiResponse<Subscription>),
        (status = 403, description = "Another user's subscription", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sub = state
        .account_service
        .cancel_subscription(&auth.user, SubscriptionId::from_uuid(id))
        .await?;
    Ok(Json(ApiResponse::new(sub)))
}

/// `GET /api/invoices` — List invoices.
#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Billing",
    summary = "List invoices",
    description = "Returns the caller's invoices. Admins see every invoice.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Invoices", body = ApiResponse<Vec<Invoice>>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn list_invoices(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let invoices = state.account_service.list_invoices(&auth.user).await;
    Json(ApiResponse::new(invoices))
}

/// `POST /api/invoices/{id}/pay` — Record payment.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins and
/// [`AppError::Conflict`] when the invoice is not pending.
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/pay",
    tag = "Billing",
    summary = "Pay invoice",
    description = "Admin only. Marks the invoice paid, activates its subscription and expires the one previously in force.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Invoice UUID"),
    ),
    responses(
        (status = 200, description = "Invoice paid", body = ApiResponse<Invoice>),
        (status = 403, description = "Admin required", body = ErrorResponse),
        (status = 404, description = "Invoice not found", body = ErrorResponse),
        (status = 409, description = "Invoice not pending", body = ErrorResponse),
    )
)]
pub async fn pay_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .account_service
        .pay_invoice(&auth.user, InvoiceId::from_uuid(id))
        .await?;
    Ok(Json(ApiResponse::new(invoice)))
}

/// Subscription and invoice routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route(
            "/subscriptions/{id}",
            get(get_subscription)
                .put(update_subscription)
                .delete(cancel_subscription),
        )
        .route("/invoices", get(list_invoices))
        .route("/invoices/{id}/pay", post(pay_invoice))
}
