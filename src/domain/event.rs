//! Event catalog records: events, categories, candidates, voters and votes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{CandidateId, CategoryId, EventId, UserId, VoterId};

/// Module configuration documents an event may carry.
///
/// Their content is opaque to the server; the display clients interpret it.
pub const KNOWN_MODULES: [&str; 4] = ["waiting_screen", "welcome_led", "mini_games", "checkin_screen"];

/// Which guest identity an event accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Phone number only.
    Phone,
    /// Access code only (printed on the invitation / QR).
    Code,
    /// Either identity.
    #[default]
    Either,
}

/// Check-in and guest authentication rules of an event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct CheckinRules {
    /// Accepted guest identity.
    #[serde(default)]
    pub identity: IdentityMode,
    /// Phone authentication requires a one-time password.
    #[serde(default)]
    pub require_otp: bool,
    /// Voters must be checked in before they can submit a ballot.
    #[serde(default)]
    pub require_checkin_to_vote: bool,
    /// Only guests imported into the guest list may authenticate.
    #[serde(default)]
    pub restrict_to_guest_list: bool,
}

/// Theme and feature settings of an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct EventSettings {
    /// Theme name used by the display clients.
    #[serde(default)]
    pub theme: Option<String>,
    /// Publish live vote counts to guests while voting is open.
    #[serde(default)]
    pub show_live_results: bool,
    /// Guest authentication rules.
    #[serde(default)]
    pub checkin: CheckinRules,
    /// Module configuration documents keyed by module name.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub modules: BTreeMap<String, serde_json::Value>,
}

/// An event (gala, party, award night) owned by a platform user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// Display name.
    pub name: String,
    /// Short public code guests type or scan.
    pub code: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Voting opens at this instant (open immediately when `None`).
    pub voting_starts_at: Option<DateTime<Utc>>,
    /// Voting closes at this instant (never closes when `None`).
    pub voting_ends_at: Option<DateTime<Utc>>,
    /// Inactive events reject check-in and voting.
    pub is_active: bool,
    /// Maximum number of voters, copied from the owner's subscription.
    pub participant_limit: Option<u32>,
    /// Theme and feature settings.
    pub settings: EventSettings,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Returns `true` if ballots may be submitted at `now`.
    #[must_use]
    pub fn is_voting_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.voting_starts_at.is_none_or(|start| start <= now)
            && self.voting_ends_at.is_none_or(|end| now < end)
    }
}

/// An award category within an event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    /// Unique category identifier.
    pub id: CategoryId,
    /// Owning event.
    pub event_id: EventId,
    /// Award title.
    pub name: String,
    /// Decorative emoji shown next to the title.
    pub emoji: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// How many candidates one voter may pick in this category.
    pub max_votes_per_voter: u32,
    /// Sort key for display.
    pub display_order: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A nominee within a category.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Candidate {
    /// Unique candidate identifier.
    pub id: CandidateId,
    /// Owning category.
    pub category_id: CategoryId,
    /// Nominee name.
    pub name: String,
    /// Photo shown on the ballot and LED screens.
    pub photo_url: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Sort key for display and tie-breaking.
    pub display_order: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A per-event guest identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Voter {
    /// Unique voter identifier.
    pub id: VoterId,
    /// Owning event.
    pub event_id: EventId,
    /// Normalized phone number.
    pub phone: Option<String>,
    /// Access code printed on the invitation.
    pub access_code: String,
    /// Guest display name.
    pub name: Option<String>,
    /// Identity was confirmed (OTP passed or imported by the organizer).
    pub verified: bool,
    /// Imported through the guest list rather than self-registered.
    pub invited: bool,
    /// Check-in timestamp.
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A single vote: one voter picked one candidate in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Vote {
    /// Voter who cast the vote.
    pub voter_id: VoterId,
    /// Category the vote belongs to.
    pub category_id: CategoryId,
    /// Chosen candidate.
    pub candidate_id: CandidateId,
    /// Submission timestamp.
    pub cast_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_event() -> Event {
        let now = Utc::now();
        Event {
            id: EventId::new(),
            name: "Year End Party".to_string(),
            code: "ABC123".to_string(),
            owner_id: UserId::new(),
            voting_starts_at: None,
            voting_ends_at: None,
            is_active: true,
            participant_limit: None,
            settings: EventSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_without_window() {
        assert!(make_event().is_voting_open(Utc::now()));
    }

    #[test]
    fn inactive_event_is_closed() {
        let mut event = make_event();
        event.is_active = false;
        assert!(!event.is_voting_open(Utc::now()));
    }

    #[test]
    fn window_bounds_are_start_inclusive_end_exclusive() {
        let now = Utc::now();
        let mut event = make_event();
        event.voting_starts_at = Some(now);
        event.voting_ends_at = Some(now + Duration::minutes(10));
        assert!(event.is_voting_open(now));
        assert!(!event.is_voting_open(now - Duration::seconds(1)));
        assert!(!event.is_voting_open(now + Duration::minutes(10)));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let Ok(settings) = serde_json::from_str::<EventSettings>(r#"{"theme":"gold"}"#) else {
            panic!("settings should parse");
        };
        assert_eq!(settings.theme.as_deref(), Some("gold"));
        assert_eq!(settings.checkin.identity, IdentityMode::Either);
        assert!(!settings.show_live_results);
    }
}
