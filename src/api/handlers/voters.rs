//! Guest-list handlers for organizers: list, import, manual check-in.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, ImportGuestsRequest, Page, PageParams};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::event::Voter;
use crate::domain::{EventId, VoterId};
use crate::error::{AppError, ErrorResponse};
use crate::service::event_service::{GuestImport, ImportReport};

/// `GET /api/events/{id}/voters` — Page through the guest list.
///
/// # Errors
///
/// Returns [`AppError`] if the event does not exist or access is missing.
#[utoipa::path(
    get,
    path = "/api/events/{id}/voters",
    tag = "Guests",
    summary = "List voters",
    description = "Returns voters in registration order with `limit`/`offset` pagination.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        PageParams,
    ),
    responses(
        (status = 200, description = "Voter page", body = ApiResponse<Page<Voter>>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_voters(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = params.clamped();
    let (voters, total) = state
        .event_service
        .list_voters(
            &auth.user,
            EventId::from_uuid(id),
            params.limit,
            params.offset,
        )
        .await?;
    Ok(Json(ApiResponse::new(params.page(voters, total))))
}

/// `POST /api/events/{id}/voters/import` — Import a batch of guests.
///
/// # Errors
///
/// Returns [`AppError`] for an empty or oversized batch or missing access.
#[utoipa::path(
    post,
    path = "/api/events/{id}/voters/import",
    tag = "Guests",
    summary = "Import guests",
    description = "Adds invited guests with generated access codes. Rows with an invalid or duplicate phone, or beyond the participant limit, are reported as skipped.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = ImportGuestsRequest,
    responses(
        (status = 201, description = "Import report", body = ApiResponse<ImportReport>),
        (status = 400, description = "Empty or oversized batch", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn import_guests(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<ImportGuestsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let guests = req.guests.into_iter().map(GuestImport::from).collect();
    let report = state
        .event_service
        .import_guests(&auth.user, EventId::from_uuid(id), guests)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(report))))
}

/// `POST /api/events/{id}/voters/{voter_id}/checkin` — Manual check-in.
///
/// # Errors
///
/// Returns [`AppError`] if the voter does not exist or access is missing.
#[utoipa::path(
    post,
    path = "/api/events/{id}/voters/{voter_id}/checkin",
    tag = "Guests",
    summary = "Check in a voter",
    description = "Marks a voter checked in. Repeating the call keeps the first check-in time.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("voter_id" = uuid::Uuid, Path, description = "Voter UUID"),
    ),
    responses(
        (status = 200, description = "Checked-in voter", body = ApiResponse<Voter>),
        (status = 404, description = "Event or voter not found", body = ErrorResponse),
    )
)]
pub async fn check_in_voter(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, voter_id)): Path<(uuid::Uuid, uuid::Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let voter = state
        .event_service
        .check_in_voter(
            &auth.user,
            EventId::from_uuid(id),
            VoterId::from_uuid(voter_id),
        )
        .await?;
    Ok(Json(ApiResponse::new(voter)))
}

/// Guest-list routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/voters", get(list_voters))
        .route("/events/{id}/voters/import", post(import_guests))
        .route("/events/{id}/voters/{voter_id}/checkin", post(check_in_voter))
}
