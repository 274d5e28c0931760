//! Guest-facing handlers: public event info, authentication, check-in,
//! live counts and ballots.
//!
//! Routes under `/events/by-code/{code}` are public. Routes under `/voter`
//! require a voter session issued by guest authentication.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, BallotRequest, VerifyOtpRequest};
use crate::app_state::AppState;
use crate::auth::AuthVoter;
use crate::domain::event::Vote;
use crate::domain::event_entry::BallotReceipt;
use crate::error::{AppError, ErrorResponse};
use crate::service::guest_service::{GuestAuthOutcome, GuestCredentials, PublicEvent};
use crate::service::voting_service::{BallotView, LiveTally};

fn outcome_response(outcome: GuestAuthOutcome) -> impl IntoResponse {
    let status = match outcome {
        GuestAuthOutcome::Authenticated { .. } => StatusCode::OK,
        GuestAuthOutcome::OtpRequired { .. } => StatusCode::ACCEPTED,
    };
    (status, Json(ApiResponse::new(outcome)))
}

/// `GET /api/events/by-code/{code}` — Public event info.
///
/// # Errors
///
/// Returns [`AppError::EventNotFound`] for an unknown code.
#[utoipa::path(
    get,
    path = "/api/events/by-code/{code}",
    tag = "Guests",
    summary = "Public event info",
    description = "Returns what the guest pages need: name, voting window, identity rule, theme and module configuration.",
    params(
        ("code" = String, Path, description = "Public event code"),
    ),
    responses(
        (status = 200, description = "Event info", body = ApiResponse<PublicEvent>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn event_info(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let info = state.guest_service.event_info(&code).await?;
    Ok(Json(ApiResponse::new(info)))
}

/// `POST /api/events/by-code/{code}/guests/auth` — Authenticate a guest.
///
/// # Errors
///
/// Returns [`AppError`] for a bad identity, an unknown guest on a
/// restricted list, a full event or an OTP resend inside the cooldown.
#[utoipa::path(
    post,
    path = "/api/events/by-code/{code}/guests/auth",
    tag = "Guests",
    summary = "Guest authentication",
    description = "Authenticates with phone and/or access code per the event's identity rule. Returns a voter session, or 202 when a one-time password was sent.",
    params(
        ("code" = String, Path, description = "Public event code"),
    ),
    request_body = GuestCredentials,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<GuestAuthOutcome>),
        (status = 202, description = "OTP issued", body = ApiResponse<GuestAuthOutcome>),
        (status = 400, description = "Invalid identity", body = ErrorResponse),
        (status = 403, description = "Not on the guest list or event full", body = ErrorResponse),
        (status = 429, description = "OTP resend cooldown", body = ErrorResponse),
    )
)]
pub async fn authenticate(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(credentials): Json<GuestCredentials>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .guest_service
        .authenticate(&code, credentials, false)
        .await?;
    Ok(outcome_response(outcome))
}

/// `POST /api/events/by-code/{code}/guests/otp/verify` — Complete OTP
/// authentication.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] for a wrong, expired or exhausted
/// code.
#[utoipa::path(
    post,
    path = "/api/events/by-code/{code}/guests/otp/verify",
    tag = "Guests",
    summary = "Verify OTP",
    params(
        ("code" = String, Path, description = "Public event code"),
    ),
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<GuestAuthOutcome>),
        (status = 401, description = "Wrong or expired code", body = ErrorResponse),
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .guest_service
        .verify_otp(&code, &req.phone, &req.otp)
        .await?;
    Ok(outcome_response(outcome))
}

/// `POST /api/events/by-code/{code}/checkin` — QR check-in.
///
/// # Errors
///
/// Returns [`AppError`] like guest authentication.
#[utoipa::path(
    post,
    path = "/api/events/by-code/{code}/checkin",
    tag = "Guests",
    summary = "QR check-in",
    description = "Authenticates the guest from the scanned access code or phone and marks them checked in.",
    params(
        ("code" = String, Path, description = "Public event code"),
    ),
    request_body = GuestCredentials,
    responses(
        (status = 200, description = "Checked in", body = ApiResponse<GuestAuthOutcome>),
        (status = 202, description = "OTP issued; check-in completes on verification", body = ApiResponse<GuestAuthOutcome>),
        (status = 400, description = "Invalid identity or inactive event", body = ErrorResponse),
        (status = 403, description = "Not on the guest list or event full", body = ErrorResponse),
    )
)]
pub async fn check_in(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(credentials): Json<GuestCredentials>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .guest_service
        .authenticate(&code, credentials, true)
        .await?;
    Ok(outcome_response(outcome))
}

/// `GET /api/events/by-code/{code}/live` — Live vote counts.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the event publishes live results.
#[utoipa::path(
    get,
    path = "/api/events/by-code/{code}/live",
    tag = "Guests",
    summary = "Live counts",
    description = "Current counts per category for LED screens. Only available when the event enables `show_live_results`.",
    params(
        ("code" = String, Path, description = "Public event code"),
    ),
    responses(
        (status = 200, description = "Live counts", body = ApiResponse<LiveTally>),
        (status = 403, description = "Live results disabled", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn live_tally(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tally = state.voting_service.live_tally_by_code(&code).await?;
    Ok(Json(ApiResponse::new(tally)))
}

/// `GET /api/voter/ballot` — The voter's ballot.
///
/// # Errors
///
/// Returns [`AppError`] if the event or voter no longer exists.
#[utoipa::path(
    get,
    path = "/api/voter/ballot",
    tag = "Voting",
    summary = "Get ballot",
    description = "Categories with their candidates and the voter's current selections.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Ballot", body = ApiResponse<BallotView>),
        (status = 401, description = "Voter session required", body = ErrorResponse),
    )
)]
pub async fn get_ballot(
    State(state): State<AppState>,
    voter: AuthVoter,
) -> Result<impl IntoResponse, AppError> {
    let ballot = state
        .voting_service
        .ballot(voter.event_id, voter.voter_id)
        .await?;
    Ok(Json(ApiResponse::new(ballot)))
}

/// `POST /api/voter/ballot` — Submit a ballot.
///
/// # Errors
///
/// Returns [`AppError`] when voting is closed, check-in is required, or a
/// selection is invalid or exceeds the category allowance. Nothing is
/// recorded on error.
#[utoipa::path(
    post,
    path = "/api/voter/ballot",
    tag = "Voting",
    summary = "Submit ballot",
    description = "Replaces the voter's votes in each listed category. An empty list withdraws them; unlisted categories are untouched.",
    security(("bearer" = [])),
    request_body = BallotRequest,
    responses(
        (status = 200, description = "Ballot recorded", body = ApiResponse<BallotReceipt>),
        (status = 400, description = "Invalid ballot or voting closed", body = ErrorResponse),
        (status = 401, description = "Voter session required", body = ErrorResponse),
        (status = 403, description = "Check-in required", body = ErrorResponse),
    )
)]
pub async fn submit_ballot(
    State(state): State<AppState>,
    voter: AuthVoter,
    Json(req): Json<BallotRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .voting_service
        .submit_ballot(voter.event_id, voter.voter_id, &req.into_selections())
        .await?;
    Ok(Json(ApiResponse::new(receipt)))
}

/// `GET /api/voter/votes` — The voter's recorded votes.
///
/// # Errors
///
/// Returns [`AppError`] if the event or voter no longer exists.
#[utoipa::path(
    get,
    path = "/api/voter/votes",
    tag = "Voting",
    summary = "My votes",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Votes", body = ApiResponse<Vec<Vote>>),
        (status = 401, description = "Voter session required", body = ErrorResponse),
    )
)]
pub async fn my_votes(
    State(state): State<AppState>,
    voter: AuthVoter,
) -> Result<impl IntoResponse, AppError> {
    let votes = state
        .voting_service
        .my_votes(voter.event_id, voter.voter_id)
        .await?;
    Ok(Json(ApiResponse::new(votes)))
}

/// `POST /api/voter/logout` — End the voter session.
#[utoipa::path(
    post,
    path = "/api/voter/logout",
    tag = "Voting",
    summary = "Voter logout",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Voter session required", body = ErrorResponse),
    )
)]
pub async fn voter_logout(State(state): State<AppState>, voter: AuthVoter) -> impl IntoResponse {
    state.sessions.revoke(&voter.token).await;
    StatusCode::NO_CONTENT
}

/// Public guest routes and voter-session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/by-code/{code}", get(event_info))
        .route("/events/by-code/{code}/guests/auth", post(authenticate))
        .route("/events/by-code/{code}/guests/otp/verify", post(verify_otp))
        .route("/events/by-code/{code}/checkin", post(check_in))
        .route("/events/by-code/{code}/live", get(live_tally))
        .route("/voter/ballot", get(get_ballot).post(submit_ballot))
        .route("/voter/votes", get(my_votes))
        .route("/voter/logout", post(voter_logout))
}
