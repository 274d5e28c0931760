//! Category and candidate handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::api::dto::{
    ApiResponse, CreateCandidateRequest, CreateCategoryRequest, UpdateCandidateRequest,
    UpdateCategoryRequest,
};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::event::{Candidate, Category};
use crate::domain::{CandidateId, CategoryId, EventId};
use crate::error::{AppError, ErrorResponse};

/// `GET /api/events/{id}/categories` — List categories in display order.
///
/// # Errors
///
/// Returns [`AppError`] if the event does not exist or access is missing.
#[utoipa::path(
    get,
    path = "/api/events/{id}/categories",
    tag = "Catalog",
    summary = "List categories",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Categories", body = ApiResponse<Vec<Category>>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let categories = state
        .event_service
        .list_categories(&auth.user, EventId::from_uuid(id))
        .await?;
    Ok(Json(ApiResponse::new(categories)))
}

/// `POST /api/events/{id}/categories` — Create a category.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input or missing access.
#[utoipa::path(
    post,
    path = "/api/events/{id}/categories",
    tag = "Catalog",
    summary = "Create category",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = state
        .event_service
        .create_category(&auth.user, EventId::from_uuid(id), req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(category))))
}

/// `PUT /api/events/{id}/categories/{category_id}` — Update a category.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input or missing access.
#[utoipa::path(
    put,
    path = "/api/events/{id}/categories/{category_id}",
    tag = "Catalog",
    summary = "Update category",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("category_id" = uuid::Uuid, Path, description = "Category UUID"),
    ),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Event or category not found", body = ErrorResponse),
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, category_id)): Path<(uuid::Uuid, uuid::Uuid)>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = state
        .event_service
        .update_category(
            &auth.user,
            EventId::from_uuid(id),
            CategoryId::from_uuid(category_id),
            req.into(),
        )
        .await?;
    Ok(Json(ApiResponse::new(category)))
}

/// `DELETE /api/events/{id}/categories/{category_id}` — Delete a category
/// with its candidates and votes.
///
/// # Errors
///
/// Returns [`AppError`] if the category does not exist or access is
/// missing.
#[utoipa::path(
    delete,
    path = "/api/events/{id}/categories/{category_id}",
    tag = "Catalog",
    summary = "Delete category",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("category_id" = uuid::Uuid, Path, description = "Category UUID"),
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Event or category not found", body = ErrorResponse),
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, category_id)): Path<(uuid::Uuid, uuid::Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .event_service
        .delete_category(
            &auth.user,
            EventId::from_uuid(id),
            CategoryId::from_uuid(category_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/events/{id}/categories/{category_id}/candidates` — List
/// candidates of a category.
///
/// # Errors
///
/// Returns [`AppError`] if the category does not exist or access is
/// missing.
#[utoipa::path(
    get,
    path = "/api/events/{id}/categories/{category_id}/candidates",
    tag = "Catalog",
    summary = "List candidates",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("category_id" = uuid::Uuid, Path, description = "Category UUID"),
    ),
    responses(
        (status = 200, description = "Candidates", body = ApiResponse<Vec<Candidate>>),
        (status = 404, description = "Event or category not found", body = ErrorResponse),
    )
)]
pub async fn list_candidates(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, category_id)): Path<(uuid::Uuid, uuid::Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let candidates = state
        .event_service
        .list_candidates(
            &auth.user,
            EventId::from_uuid(id),
            CategoryId::from_uuid(category_id),
        )
        .await?;
    Ok(Json(ApiResponse::new(candidates)))
}

/// `POST /api/events/{id}/categories/{category_id}/candidates` — Nominate a
/// candidate.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input or missing access.
#[utoipa::path(
    post,
    path = "/api/events/{id}/categories/{category_id}/candidates",
    tag = "Catalog",
    summary = "Create candidate",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("category_id" = uuid::Uuid, Path, description = "Category UUID"),
    ),
    request_body = CreateCandidateRequest,
    responses(
        (status = 201, description = "Candidate created", body = ApiResponse<Candidate>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Event or category not found", body = ErrorResponse),
    )
)]
pub async fn create_candidate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, category_id)): Path<(uuid::Uuid, uuid::Uuid)>,
    Json(req): Json<CreateCandidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let candidate = state
        .event_service
        .create_candidate(
            &auth.user,
            EventId::from_uuid(id),
            CategoryId::from_uuid(category_id),
            req.into(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(candidate))))
}

/// `PUT /api/events/{id}/candidates/{candidate_id}` — Update a candidate.
///
/// # Errors
///
/// Returns [`AppError`] on invalid input or missing access.
#[utoipa::path(
    put,
    path = "/api/events/{id}/candidates/{candidate_id}",
    tag = "Catalog",
    summary = "Update candidate",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("candidate_id" = uuid::Uuid, Path, description = "Candidate UUID"),
    ),
    request_body = UpdateCandidateRequest,
    responses(
        (status = 200, description = "Candidate updated", body = ApiResponse<Candidate>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Event or candidate not found", body = ErrorResponse),
    )
)]
pub async fn update_candidate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, candidate_id)): Path<(uuid::Uuid, uuid::Uuid)>,
    Json(req): Json<UpdateCandidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let candidate = state
        .event_service
        .update_candidate(
            &auth.user,
            EventId::from_uuid(id),
            CandidateId::from_uuid(candidate_id),
            req.into(),
        )
        .await?;
    Ok(Json(ApiResponse::new(candidate)))
}

/// `DELETE /api/events/{id}/candidates/{candidate_id}` — Delete a candidate
/// and its votes.
///
/// # Errors
///
/// Returns [`AppError`] if the candidate does not exist or access is
/// missing.
#[utoipa::path(
    delete,
    path = "/api/events/{id}/candidates/{candidate_id}",
    tag = "Catalog",
    summary = "Delete candidate",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("candidate_id" = uuid::Uuid, Path, description = "Candidate UUID"),
    ),
    responses(
        (status = 204, description = "Candidate deleted"),
        (status = 404, description = "Event or candidate not found", body = ErrorResponse),
    )
)]
pub async fn delete_candidate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, candidate_id)): Path<(uuid::Uuid, uuid::Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .event_service
        .delete_candidate(
            &auth.user,
            EventId::from_uuid(id),
            CandidateId::from_uuid(candidate_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events/{id}/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/events/{id}/categories/{category_id}",
            put(update_category).delete(delete_category),
        )
        .route(
            "/events/{id}/categories/{category_id}/candidates",
            get(list_candidates).post(create_candidate),
        )
        .route(
            "/events/{id}/candidates/{candidate_id}",
            put(update_candidate).delete(delete_candidate),
        )
}
