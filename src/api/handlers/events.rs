//! Event handlers: create, list, get, update, delete, modules, results.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, CreateEventRequest, UpdateEventRequest};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::EventId;
use crate::domain::event::{Event, EventSettings};
use crate::domain::event_registry::EventSummary;
use crate::domain::tally::EventResults;
use crate::error::{AppError, ErrorResponse};

/// `POST /api/events` — Create an event.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input, a taken code or an exhausted
/// event quota.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    summary = "Create an event",
    description = "Reserves a slot on the caller's active subscription and creates the event. The participant limit is copied from the subscription.",
    security(("bearer" = [])),
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = ApiResponse<Event>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "No active subscription or quota exhausted", body = ErrorResponse),
        (status = 409, description = "Code already in use", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = state
        .event_service
        .create_event(&auth.user, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(event))))
}

/// `GET /api/events` — List events.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "Events",
    summary = "List events",
    description = "Returns the caller's events, newest first. Admins see every event.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Event summaries", body = ApiResponse<Vec<EventSummary>>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn list_events(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let events = state.event_service.list_events(&auth.user).await;
    Json(ApiResponse::new(events))
}

/// `GET /api/events/{id}` — Get an event.
///
/// # Errors
///
/// Returns [`AppError`] if the event does not exist or belongs to another
/// organizer.
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "Events",
    summary = "Get event",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event", body = ApiResponse<Event>),
        (status = 403, description = "Another organizer's event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let event = state
        .event_service
        .get_event(&auth.user, EventId::from_uuid(id))
        .await?;
    Ok(Json(ApiResponse::new(event)))
}

/// `PUT /api/events/{id}` — Update an event.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input or missing access.
#[utoipa::path(
    put,
    path = "/api/events/{id}",
    tag = "Events",
    summary = "Update event",
    description = "Changes name, voting window, active flag, theme, live results or check-in rules. Omitted fields are unchanged.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = ApiResponse<Event>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Another organizer's event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = state
        .event_service
        .update_event(&auth.user, EventId::from_uuid(id), req.into())
        .await?;
    Ok(Json(ApiResponse::new(event)))
}

/// `DELETE /api/events/{id}` — Delete an event.
///
/// # Errors
///
/// Returns [`AppError`] if the event does not exist or belongs to another
/// organizer.
#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    tag = "Events",
    summary = "Delete event",
    description = "Removes the event with its catalog, guests and votes, and releases its subscription slot.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 403, description = "Another organizer's event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .event_service
        .delete_event(&auth.user, EventId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/events/{id}/modules/{module}` — Store a module configuration.
///
/// # Errors
///
/// Returns [`AppError`] for an unknown module or missing access.
#[utoipa::path(
    put,
    path = "/api/events/{id}/modules/{module}",
    tag = "Events",
    summary = "Upsert module configuration",
    description = "Stores an opaque configuration document for `waiting_screen`, `welcome_led`, `mini_games` or `checkin_screen`.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("module" = String, Path, description = "Module name"),
    ),
    request_body(content = Object, description = "Module configuration document"),
    responses(
        (status = 200, description = "Updated settings", body = ApiResponse<EventSettings>),
        (status = 400, description = "Unknown module", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn upsert_module(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, module)): Path<(uuid::Uuid, String)>,
    Json(config): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state
        .event_service
        .upsert_module(&auth.user, EventId::from_uuid(id), &module, config)
        .await?;
    Ok(Json(ApiResponse::new(settings)))
}

/// `DELETE /api/events/{id}/modules/{module}` — Remove a module configuration.
///
/// # Errors
///
/// Returns [`AppError`] if the module is not configured or access is
/// missing.
#[utoipa::path(
    delete,
    path = "/api/events/{id}/modules/{module}",
    tag = "Events",
    summary = "Remove module configuration",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("module" = String, Path, description = "Module name"),
    ),
    responses(
        (status = 204, description = "Module removed"),
        (status = 404, description = "Event or module not found", body = ErrorResponse),
    )
)]
pub async fn remove_module(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, module)): Path<(uuid::Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .event_service
        .remove_module(&auth.user, EventId::from_uuid(id), &module)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/events/{id}/results` — Ranked results.
///
/// # Errors
///
/// Returns [`AppError`] if the event does not exist or belongs to another
/// organizer.
#[utoipa::path(
    get,
    path = "/api/events/{id}/results",
    tag = "Events",
    summary = "Get results",
    description = "Per category, candidates ranked by descending votes (ties: display order, name, id) with shares, distinct voters and winners.",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Results", body = ApiResponse<EventResults>),
        (status = 403, description = "Another organizer's event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_results(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let results = state
        .event_service
        .results(&auth.user, EventId::from_uuid(id))
        .await?;
    Ok(Json(ApiResponse::new(results)))
}

/// Event management routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/events/{id}/modules/{module}",
            put(upsert_module).delete(remove_module),
        )
        .route("/events/{id}/results", get(get_results))
}
