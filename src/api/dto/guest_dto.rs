//! DTOs for guest-facing endpoints: authentication and ballots.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::event_entry::BallotSelection;
use crate::domain::{CandidateId, CategoryId};

/// Request body for `POST /api/events/by-code/{code}/guests/otp/verify`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    /// Phone number the code was sent to.
    pub phone: String,
    /// Six-digit one-time password.
    pub otp: String,
}

/// One category of a submitted ballot.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SelectionDto {
    /// Category being voted in.
    pub category_id: CategoryId,
    /// Picked candidates; an empty list withdraws the voter's votes.
    #[serde(default)]
    pub candidate_ids: Vec<CandidateId>,
}

impl From<SelectionDto> for BallotSelection {
    fn from(dto: SelectionDto) -> Self {
        Self {
            category_id: dto.category_id,
            candidate_ids: dto.candidate_ids,
        }
    }
}

/// Request body for `POST /api/voter/ballot`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BallotRequest {
    /// Categories to replace. Categories not listed keep their votes.
    pub selections: Vec<SelectionDto>,
}

impl BallotRequest {
    /// Converts the request into domain selections.
    #[must_use]
    pub fn into_selections(self) -> Vec<BallotSelection> {
        self.selections.into_iter().map(BallotSelection::from).collect()
    }
}
