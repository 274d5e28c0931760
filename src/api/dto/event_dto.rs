//! DTOs for the admin console: events, catalog and guest list.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use super::common_dto::double_option;
use crate::domain::event::{CheckinRules, EventSettings};
use crate::domain::event_entry::{CandidatePatch, CategoryPatch, NewCandidate, NewCategory};
use crate::service::event_service::{EventPatch, GuestImport, NewEvent};

/// Request body for `POST /api/events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Display name.
    pub name: String,
    /// Custom public code (4-12 letters or digits); generated when omitted.
    #[serde(default)]
    pub code: Option<String>,
    /// Voting opens at this instant.
    #[serde(default)]
    pub voting_starts_at: Option<DateTime<Utc>>,
    /// Voting closes at this instant.
    #[serde(default)]
    pub voting_ends_at: Option<DateTime<Utc>>,
    /// Initial settings.
    #[serde(default)]
    pub settings: Option<EventSettings>,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(req: CreateEventRequest) -> Self {
        Self {
            name: req.name,
            code: req.code,
            voting_starts_at: req.voting_starts_at,
            voting_ends_at: req.voting_ends_at,
            settings: req.settings,
        }
    }
}

/// Request body for `PUT /api/events/{id}`. Omitted fields are left
/// unchanged; `null` clears optional ones.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New voting start.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub voting_starts_at: Option<Option<DateTime<Utc>>>,
    /// New voting end.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub voting_ends_at: Option<Option<DateTime<Utc>>>,
    /// Activate or deactivate the event.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// New theme.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub theme: Option<Option<String>>,
    /// Publish live counts to guests.
    #[serde(default)]
    pub show_live_results: Option<bool>,
    /// Replacement check-in rules.
    #[serde(default)]
    pub checkin: Option<CheckinRules>,
}

impl From<UpdateEventRequest> for EventPatch {
    fn from(req: UpdateEventRequest) -> Self {
        Self {
            name: req.name,
            voting_starts_at: req.voting_starts_at,
            voting_ends_at: req.voting_ends_at,
            is_active: req.is_active,
            theme: req.theme,
            show_live_results: req.show_live_results,
            checkin: req.checkin,
        }
    }
}

/// Request body for `POST /api/events/{id}/categories`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    /// Award title.
    pub name: String,
    /// Decorative emoji.
    #[serde(default)]
    pub emoji: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Votes allowed per voter. Defaults to 1.
    #[serde(default = "default_max_votes")]
    pub max_votes_per_voter: u32,
    /// Sort key; appended last when omitted.
    #[serde(default)]
    pub display_order: Option<i32>,
}

fn default_max_votes() -> u32 {
    1
}

impl From<CreateCategoryRequest> for NewCategory {
    fn from(req: CreateCategoryRequest) -> Self {
        Self {
            name: req.name,
            emoji: req.emoji,
            description: req.description,
            max_votes_per_voter: req.max_votes_per_voter,
            display_order: req.display_order,
        }
    }
}

/// Request body for `PUT /api/events/{id}/categories/{category_id}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    /// New title.
    #[serde(default)]
    pub name: Option<String>,
    /// New emoji; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub emoji: Option<Option<String>>,
    /// New description; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    /// New vote allowance.
    #[serde(default)]
    pub max_votes_per_voter: Option<u32>,
    /// New sort key.
    #[serde(default)]
    pub display_order: Option<i32>,
}

impl From<UpdateCategoryRequest> for CategoryPatch {
    fn from(req: UpdateCategoryRequest) -> Self {
        Self {
            name: req.name,
            emoji: req.emoji,
            description: req.description,
            max_votes_per_voter: req.max_votes_per_voter,
            display_order: req.display_order,
        }
    }
}

/// Request body for `POST /api/events/{id}/categories/{category_id}/candidates`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCandidateRequest {
    /// Nominee name.
    pub name: String,
    /// Photo URL.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Sort key; appended last when omitted.
    #[serde(default)]
    pub display_order: Option<i32>,
}

impl From<CreateCandidateRequest> for NewCandidate {
    fn from(req: CreateCandidateRequest) -> Self {
        Self {
            name: req.name,
            photo_url: req.photo_url,
            description: req.description,
            display_order: req.display_order,
        }
    }
}

/// Request body for `PUT /api/events/{id}/candidates/{candidate_id}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCandidateRequest {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New photo URL; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub photo_url: Option<Option<String>>,
    /// New description; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    /// New sort key.
    #[serde(default)]
    pub display_order: Option<i32>,
}

impl From<UpdateCandidateRequest> for CandidatePatch {
    fn from(req: UpdateCandidateRequest) -> Self {
        Self {
            name: req.name,
            photo_url: req.photo_url,
            description: req.description,
            display_order: req.display_order,
        }
    }
}

/// One row of a guest-list import.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GuestRow {
    /// Phone number in any common Vietnamese format.
    #[serde(default)]
    pub phone: Option<String>,
    /// Guest name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body for `POST /api/events/{id}/voters/import`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ImportGuestsRequest {
    /// Guests to add; access codes are generated.
    pub guests: Vec<GuestRow>,
}

impl From<GuestRow> for GuestImport {
    fn from(row: GuestRow) -> Self {
        Self {
            phone: row.phone,
            name: row.name,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn category_defaults_to_single_vote() {
        let Ok(req) = serde_json::from_str::<CreateCategoryRequest>(r#"{"name":"MVP"}"#) else {
            panic!("parse failed");
        };
        let new = NewCategory::from(req);
        assert_eq!(new.max_votes_per_voter, 1);
        assert_eq!(new.display_order, None);
    }

    #[test]
    fn event_patch_clears_window() {
        let Ok(req) =
            serde_json::from_str::<UpdateEventRequest>(r#"{"voting_ends_at":null,"is_active":false}"#)
        else {
            panic!("parse failed");
        };
        let patch = EventPatch::from(req);
        assert_eq!(patch.voting_ends_at, Some(None));
        assert_eq!(patch.voting_starts_at, None);
        assert_eq!(patch.is_active, Some(false));
    }
}
