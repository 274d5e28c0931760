//! System endpoints: health check and package catalog.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::ApiResponse;
use crate::app_state::AppState;
use crate::domain::account::{PACKAGES, Package};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /api/packages` — Subscription package catalog.
#[utoipa::path(
    get,
    path = "/api/packages",
    tag = "System",
    summary = "List packages",
    description = "Returns the purchasable service tiers with their prices and limits.",
    responses(
        (status = 200, description = "Package catalog", body = ApiResponse<Vec<Package>>),
    )
)]
pub async fn packages_handler() -> impl IntoResponse {
    Json(ApiResponse::new(PACKAGES.to_vec()))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/packages", get(packages_handler))
}
