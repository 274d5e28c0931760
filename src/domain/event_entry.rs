//! Event aggregate: the event record plus its catalog, guests and votes.
//!
//! All vote-integrity rules live here so that they are checked under the
//! same per-event write lock that applies the mutation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::event::{Candidate, Category, Event, Vote, Voter};
use super::{CandidateId, CategoryId, EventId, VoterId};
use crate::error::AppError;

/// Fields for a new category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    /// Award title.
    pub name: String,
    /// Decorative emoji.
    pub emoji: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Votes allowed per voter (must be at least 1).
    pub max_votes_per_voter: u32,
    /// Sort key; appended after existing categories when `None`.
    pub display_order: Option<i32>,
}

/// Partial update of a category. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    /// New title.
    pub name: Option<String>,
    /// New emoji (`Some(None)` clears it).
    pub emoji: Option<Option<String>>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// New vote allowance.
    pub max_votes_per_voter: Option<u32>,
    /// New sort key.
    pub display_order: Option<i32>,
}

/// Fields for a new candidate.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    /// Nominee name.
    pub name: String,
    /// Photo URL.
    pub photo_url: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Sort key; appended after existing candidates when `None`.
    pub display_order: Option<i32>,
}

/// Partial update of a candidate. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct CandidatePatch {
    /// New name.
    pub name: Option<String>,
    /// New photo URL (`Some(None)` clears it).
    pub photo_url: Option<Option<String>>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// New sort key.
    pub display_order: Option<i32>,
}

/// One line of a ballot: the candidates a voter picks in one category.
#[derive(Debug, Clone)]
pub struct BallotSelection {
    /// Category being voted in.
    pub category_id: CategoryId,
    /// Picked candidates. Duplicates are ignored; empty withdraws.
    pub candidate_ids: Vec<CandidateId>,
}

/// Outcome of an applied ballot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BallotReceipt {
    /// Categories whose votes were replaced.
    pub replaced_categories: Vec<CategoryId>,
    /// Number of vote rows now held for those categories.
    pub votes_recorded: usize,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
}

/// Per-candidate vote count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CandidateCount {
    /// Category of the candidate.
    pub category_id: CategoryId,
    /// Candidate identifier.
    pub candidate_id: CandidateId,
    /// Votes received.
    pub votes: u64,
}

/// Aggregate holding an event and everything scoped to it.
///
/// Each event in the registry is stored as an `EventEntry` behind its own
/// lock. The whole aggregate is serializable for snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    /// Event record.
    pub event: Event,
    /// Categories keyed by ID.
    pub categories: BTreeMap<CategoryId, Category>,
    /// Candidates keyed by ID.
    pub candidates: BTreeMap<CandidateId, Candidate>,
    /// Voters keyed by ID.
    pub voters: BTreeMap<VoterId, Voter>,
    /// All votes of the event.
    pub votes: Vec<Vote>,
    /// Timestamp of the last mutation.
    pub last_modified_at: DateTime<Utc>,
}

impl EventEntry {
    /// Wraps a freshly created event with an empty catalog.
    #[must_use]
    pub fn new(event: Event) -> Self {
        let last_modified_at = event.updated_at;
        Self {
            event,
            categories: BTreeMap::new(),
            candidates: BTreeMap::new(),
            voters: BTreeMap::new(),
            votes: Vec::new(),
            last_modified_at,
        }
    }

    /// Returns the event identifier.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event.id
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified_at = now;
        self.event.updated_at = now;
    }

    // ── Categories ──────────────────────────────────────────────────────

    /// Returns categories ordered by display order, then name.
    #[must_use]
    pub fn ordered_categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.categories.values().collect();
        categories.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        categories
    }

    /// Returns a category of this event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`] if the category does not exist.
    pub fn category(&self, category_id: CategoryId) -> Result<&Category, AppError> {
        self.categories
            .get(&category_id)
            .ok_or(AppError::CategoryNotFound(*category_id.as_uuid()))
    }

    /// Adds a category.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] on an empty name or a zero vote
    /// allowance.
    pub fn add_category(
        &mut self,
        new: NewCategory,
        now: DateTime<Utc>,
    ) -> Result<Category, AppError> {
        let name = required_text(&new.name, "category name")?;
        validate_allowance(new.max_votes_per_voter)?;
        let display_order = new.display_order.unwrap_or_else(|| {
            self.categories
                .values()
                .map(|c| c.display_order)
                .max()
                .map_or(0, |max| max.saturating_add(1))
        });
        let category = Category {
            id: CategoryId::new(),
            event_id: self.event.id,
            name,
            emoji: new.emoji,
            description: new.description,
            max_votes_per_voter: new.max_votes_per_voter,
            display_order,
            created_at: now,
        };
        self.categories.insert(category.id, category.clone());
        self.touch(now);
        Ok(category)
    }

    /// Updates a category.
    ///
    /// Lowering `max_votes_per_voter` does not rewrite existing ballots;
    /// the new allowance applies to the next submission.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`] or [`AppError::InvalidRequest`].
    pub fn update_category(
        &mut self,
        category_id: CategoryId,
        patch: CategoryPatch,
        now: DateTime<Utc>,
    ) -> Result<Category, AppError> {
        let name = patch
            .name
            .as_deref()
            .map(|n| required_text(n, "category name"))
            .transpose()?;
        if let Some(max) = patch.max_votes_per_voter {
            validate_allowance(max)?;
        }
        let category = self
            .categories
            .get_mut(&category_id)
            .ok_or(AppError::CategoryNotFound(*category_id.as_uuid()))?;
        if let Some(name) = name {
            category.name = name;
        }
        if let Some(emoji) = patch.emoji {
            category.emoji = emoji;
        }
        if let Some(description) = patch.description {
            category.description = description;
        }
        if let Some(max) = patch.max_votes_per_voter {
            category.max_votes_per_voter = max;
        }
        if let Some(order) = patch.display_order {
            category.display_order = order;
        }
        let updated = category.clone();
        self.touch(now);
        Ok(updated)
    }

    /// Removes a category together with its candidates and votes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`] if the category does not exist.
    pub fn remove_category(
        &mut self,
        category_id: CategoryId,
        now: DateTime<Utc>,
    ) -> Result<Category, AppError> {
        let category = self
            .categories
            .remove(&category_id)
            .ok_or(AppError::CategoryNotFound(*category_id.as_uuid()))?;
        self.candidates.retain(|_, c| c.category_id != category_id);
        self.votes.retain(|v| v.category_id != category_id);
        self.touch(now);
        Ok(category)
    }

    // ── Candidates ──────────────────────────────────────────────────────

    /// Returns the candidates of a category ordered by display order, then
    /// name.
    #[must_use]
    pub fn candidates_in(&self, category_id: CategoryId) -> Vec<&Candidate> {
        let mut candidates: Vec<&Candidate> = self
            .candidates
            .values()
            .filter(|c| c.category_id == category_id)
            .collect();
        candidates.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates
    }

    /// Adds a candidate to a category.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CategoryNotFound`] or [`AppError::InvalidRequest`].
    pub fn add_candidate(
        &mut self,
        category_id: CategoryId,
        new: NewCandidate,
        now: DateTime<Utc>,
    ) -> Result<Candidate, AppError> {
        self.category(category_id)?;
        let name = required_text(&new.name, "candidate name")?;
        let display_order = new.display_order.unwrap_or_else(|| {
            self.candidates
                .values()
                .filter(|c| c.category_id == category_id)
                .map(|c| c.display_order)
                .max()
                .map_or(0, |max| max.saturating_add(1))
        });
        let candidate = Candidate {
            id: CandidateId::new(),
            category_id,
            name,
            photo_url: new.photo_url,
            description: new.description,
            display_order,
            created_at: now,
        };
        self.candidates.insert(candidate.id, candidate.clone());
        self.touch(now);
        Ok(candidate)
    }

    /// Updates a candidate.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CandidateNotFound`] or [`AppError::InvalidRequest`].
    pub fn update_candidate(
        &mut self,
        candidate_id: CandidateId,
        patch: CandidatePatch,
        now: DateTime<Utc>,
    ) -> Result<Candidate, AppError> {
        let name = patch
            .name
            .as_deref()
            .map(|n| required_text(n, "candidate name"))
            .transpose()?;
        let candidate = self
            .candidates
            .get_mut(&candidate_id)
            .ok_or(AppError::CandidateNotFound(*candidate_id.as_uuid()))?;
        if let Some(name) = name {
            candidate.name = name;
        }
        if let Some(photo_url) = patch.photo_url {
            candidate.photo_url = photo_url;
        }
        if let Some(description) = patch.description {
            candidate.description = description;
        }
        if let Some(order) = patch.display_order {
            candidate.display_order = order;
        }
        let updated = candidate.clone();
        self.touch(now);
        Ok(updated)
    }

    /// Removes a candidate and every vote cast for it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CandidateNotFound`] if the candidate does not exist.
    pub fn remove_candidate(
        &mut self,
        candidate_id: CandidateId,
        now: DateTime<Utc>,
    ) -> Result<Candidate, AppError> {
        let candidate = self
            .candidates
            .remove(&candidate_id)
            .ok_or(AppError::CandidateNotFound(*candidate_id.as_uuid()))?;
        self.votes.retain(|v| v.candidate_id != candidate_id);
        self.touch(now);
        Ok(candidate)
    }

    // ── Voters ──────────────────────────────────────────────────────────

    /// Returns a voter of this event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::VoterNotFound`] if the voter does not exist.
    pub fn voter(&self, voter_id: VoterId) -> Result<&Voter, AppError> {
        self.voters
            .get(&voter_id)
            .ok_or(AppError::VoterNotFound(*voter_id.as_uuid()))
    }

    /// Finds a voter by normalized phone number.
    #[must_use]
    pub fn voter_by_phone(&self, phone: &str) -> Option<&Voter> {
        self.voters
            .values()
            .find(|v| v.phone.as_deref() == Some(phone))
    }

    /// Finds a voter by normalized access code.
    #[must_use]
    pub fn voter_by_code(&self, access_code: &str) -> Option<&Voter> {
        self.voters.values().find(|v| v.access_code == access_code)
    }

    /// Returns voters ordered by creation time.
    #[must_use]
    pub fn ordered_voters(&self) -> Vec<&Voter> {
        let mut voters: Vec<&Voter> = self.voters.values().collect();
        voters.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        voters
    }

    /// Registers a new voter, generating a unique access code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::LimitExceeded`] when the participant limit is
    /// reached and [`AppError::Conflict`] when the phone is already
    /// registered.
    pub fn register_voter(
        &mut self,
        phone: Option<String>,
        name: Option<String>,
        invited: bool,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<Voter, AppError> {
        if let Some(limit) = self.event.participant_limit
            && self.voters.len() >= limit as usize
        {
            return Err(AppError::LimitExceeded(format!(
                "event {} allows at most {limit} participants",
                self.event.id
            )));
        }
        if let Some(p) = phone.as_deref()
            && self.voter_by_phone(p).is_some()
        {
            return Err(AppError::Conflict(format!("phone {p} already registered")));
        }

        let mut access_code = super::identity::generate_code();
        while self.voter_by_code(&access_code).is_some() {
            access_code = super::identity::generate_code();
        }

        let voter = Voter {
            id: VoterId::new(),
            event_id: self.event.id,
            phone,
            access_code,
            name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            verified,
            invited,
            checked_in_at: None,
            created_at: now,
        };
        self.voters.insert(voter.id, voter.clone());
        self.touch(now);
        Ok(voter)
    }

    /// Marks a voter as verified.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::VoterNotFound`] if the voter does not exist.
    pub fn verify_voter(&mut self, voter_id: VoterId, now: DateTime<Utc>) -> Result<(), AppError> {
        let voter = self
            .voters
            .get_mut(&voter_id)
            .ok_or(AppError::VoterNotFound(*voter_id.as_uuid()))?;
        if !voter.verified {
            voter.verified = true;
            self.touch(now);
        }
        Ok(())
    }

    /// Checks a voter in. Returns `true` on the first check-in and `false`
    /// when the voter was already checked in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::VoterNotFound`] or [`AppError::Forbidden`] when
    /// the event is inactive.
    pub fn check_in(&mut self, voter_id: VoterId, now: DateTime<Utc>) -> Result<bool, AppError> {
        if !self.event.is_active {
            return Err(AppError::Forbidden(format!(
                "event {} is not active",
                self.event.id
            )));
        }
        let voter = self
            .voters
            .get_mut(&voter_id)
            .ok_or(AppError::VoterNotFound(*voter_id.as_uuid()))?;
        if voter.checked_in_at.is_some() {
            return Ok(false);
        }
        voter.checked_in_at = Some(now);
        self.touch(now);
        Ok(true)
    }

    // ── Votes ───────────────────────────────────────────────────────────

    /// Returns the votes of one voter.
    #[must_use]
    pub fn votes_of(&self, voter_id: VoterId) -> Vec<&Vote> {
        self.votes.iter().filter(|v| v.voter_id == voter_id).collect()
    }

    /// Applies a ballot with replace semantics.
    ///
    /// Every line is validated before anything is written: the voting
    /// window must be open, each category must belong to the event and
    /// appear once, each candidate must belong to its category, and the
    /// de-duplicated pick count must not exceed the category allowance.
    /// On success the voter's previous votes in each named category are
    /// replaced by the new picks. Categories not named are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::VotingClosed`], [`AppError::VoterNotFound`],
    /// [`AppError::Forbidden`] (check-in required),
    /// [`AppError::CategoryNotFound`], [`AppError::CandidateNotFound`] or
    /// [`AppError::InvalidRequest`]. On error no vote is changed.
    pub fn apply_ballot(
        &mut self,
        voter_id: VoterId,
        selections: &[BallotSelection],
        now: DateTime<Utc>,
    ) -> Result<BallotReceipt, AppError> {
        if !self.event.is_voting_open(now) {
            return Err(AppError::VotingClosed(*self.event.id.as_uuid()));
        }
        let voter = self.voter(voter_id)?;
        if self.event.settings.checkin.require_checkin_to_vote && voter.checked_in_at.is_none() {
            return Err(AppError::Forbidden(
                "guests must check in before voting".to_string(),
            ));
        }
        if selections.is_empty() {
            return Err(AppError::InvalidRequest("ballot is empty".to_string()));
        }

        let validated = self.validate_ballot(selections)?;

        let replaced: HashSet<CategoryId> = validated.iter().map(|(c, _)| *c).collect();
        self.votes
            .retain(|v| !(v.voter_id == voter_id && replaced.contains(&v.category_id)));

        let mut votes_recorded = 0;
        for (category_id, candidate_ids) in &validated {
            for candidate_id in candidate_ids {
                self.votes.push(Vote {
                    voter_id,
                    category_id: *category_id,
                    candidate_id: *candidate_id,
                    cast_at: now,
                });
                votes_recorded += 1;
            }
        }
        self.touch(now);

        Ok(BallotReceipt {
            replaced_categories: validated.into_iter().map(|(c, _)| c).collect(),
            votes_recorded,
            submitted_at: now,
        })
    }

    fn validate_ballot(
        &self,
        selections: &[BallotSelection],
    ) -> Result<Vec<(CategoryId, Vec<CandidateId>)>, AppError> {
        let mut seen_categories = HashSet::new();
        let mut validated = Vec::with_capacity(selections.len());

        for selection in selections {
            let category = self.category(selection.category_id)?;
            if !seen_categories.insert(category.id) {
                return Err(AppError::InvalidRequest(format!(
                    "category {} appears more than once",
                    category.id
                )));
            }

            let mut seen_candidates = HashSet::new();
            let mut picks = Vec::with_capacity(selection.candidate_ids.len());
            for candidate_id in &selection.candidate_ids {
                if !seen_candidates.insert(*candidate_id) {
                    continue;
                }
                let candidate = self
                    .candidates
                    .get(candidate_id)
                    .ok_or(AppError::CandidateNotFound(*candidate_id.as_uuid()))?;
                if candidate.category_id != category.id {
                    return Err(AppError::InvalidRequest(format!(
                        "candidate {candidate_id} is not nominated in category {}",
                        category.id
                    )));
                }
                picks.push(*candidate_id);
            }

            if picks.len() > category.max_votes_per_voter as usize {
                return Err(AppError::InvalidRequest(format!(
                    "category '{}' allows at most {} vote(s), got {}",
                    category.name,
                    category.max_votes_per_voter,
                    picks.len()
                )));
            }
            validated.push((category.id, picks));
        }
        Ok(validated)
    }

    /// Returns vote counts for every candidate of the given categories
    /// (all categories when `filter` is `None`). Candidates without votes
    /// are included with a zero count.
    #[must_use]
    pub fn tally(&self, filter: Option<&BTreeSet<CategoryId>>) -> Vec<CandidateCount> {
        let mut counts: BTreeMap<CandidateId, u64> = BTreeMap::new();
        for vote in &self.votes {
            *counts.entry(vote.candidate_id).or_insert(0) += 1;
        }
        let mut out = Vec::new();
        for category in self.ordered_categories() {
            if filter.is_some_and(|f| !f.contains(&category.id)) {
                continue;
            }
            for candidate in self.candidates_in(category.id) {
                out.push(CandidateCount {
                    category_id: category.id,
                    candidate_id: candidate.id,
                    votes: counts.get(&candidate.id).copied().unwrap_or(0),
                });
            }
        }
        out
    }
}

pub(crate) fn required_text(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > 200 {
        return Err(AppError::InvalidRequest(format!(
            "{field} must be at most 200 characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_allowance(max_votes_per_voter: u32) -> Result<(), AppError> {
    if max_votes_per_voter == 0 {
        return Err(AppError::InvalidRequest(
            "max_votes_per_voter must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::domain::event::EventSettings;

    pub(crate) fn make_entry() -> EventEntry {
        let now = Utc::now();
        EventEntry::new(Event {
            id: EventId::new(),
            name: "Gala 2026".to_string(),
            code: "GALA26".to_string(),
            owner_id: UserId::new(),
            voting_starts_at: None,
            voting_ends_at: None,
            is_active: true,
            participant_limit: None,
            settings: EventSettings::default(),
            created_at: now,
            updated_at: now,
        })
    }

    pub(crate) fn add_category(entry: &mut EventEntry, name: &str, max: u32) -> CategoryId {
        let Ok(category) = entry.add_category(
            NewCategory {
                name: name.to_string(),
                emoji: None,
                description: None,
                max_votes_per_voter: max,
                display_order: None,
            },
            Utc::now(),
        ) else {
            panic!("category creation failed");
        };
        category.id
    }

    pub(crate) fn add_candidate(
        entry: &mut EventEntry,
        category_id: CategoryId,
        name: &str,
    ) -> CandidateId {
        let Ok(candidate) = entry.add_candidate(
            category_id,
            NewCandidate {
                name: name.to_string(),
                photo_url: None,
                description: None,
                display_order: None,
            },
            Utc::now(),
        ) else {
            panic!("candidate creation failed");
        };
        candidate.id
    }

    pub(crate) fn add_voter(entry: &mut EventEntry) -> VoterId {
        let Ok(voter) = entry.register_voter(None, None, false, true, Utc::now()) else {
            panic!("voter registration failed");
        };
        voter.id
    }

    fn ballot(category_id: CategoryId, picks: &[CandidateId]) -> Vec<BallotSelection> {
        vec![BallotSelection {
            category_id,
            candidate_ids: picks.to_vec(),
        }]
    }

    #[test]
    fn rejects_more_picks_than_allowed() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "Best Dressed", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let b = add_candidate(&mut entry, cat, "Binh");
        let voter = add_voter(&mut entry);

        let result = entry.apply_ballot(voter, &ballot(cat, &[a, b]), Utc::now());
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert!(entry.votes.is_empty());
    }

    #[test]
    fn duplicate_picks_count_once() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "Best Dressed", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let voter = add_voter(&mut entry);

        let Ok(receipt) = entry.apply_ballot(voter, &ballot(cat, &[a, a]), Utc::now()) else {
            panic!("ballot should be accepted");
        };
        assert_eq!(receipt.votes_recorded, 1);
        assert_eq!(entry.votes.len(), 1);
    }

    #[test]
    fn resubmission_replaces_previous_votes() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "Team Spirit", 2);
        let a = add_candidate(&mut entry, cat, "An");
        let b = add_candidate(&mut entry, cat, "Binh");
        let c = add_candidate(&mut entry, cat, "Chi");
        let voter = add_voter(&mut entry);

        assert!(entry.apply_ballot(voter, &ballot(cat, &[a, b]), Utc::now()).is_ok());
        assert_eq!(entry.votes_of(voter).len(), 2);

        assert!(entry.apply_ballot(voter, &ballot(cat, &[c]), Utc::now()).is_ok());
        let votes = entry.votes_of(voter);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes.first().map(|v| v.candidate_id), Some(c));
    }

    #[test]
    fn unnamed_categories_are_untouched() {
        let mut entry = make_entry();
        let cat1 = add_category(&mut entry, "Best Dressed", 1);
        let cat2 = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat1, "An");
        let b = add_candidate(&mut entry, cat2, "Binh");
        let voter = add_voter(&mut entry);

        assert!(entry.apply_ballot(voter, &ballot(cat1, &[a]), Utc::now()).is_ok());
        assert!(entry.apply_ballot(voter, &ballot(cat2, &[b]), Utc::now()).is_ok());
        assert_eq!(entry.votes_of(voter).len(), 2);
    }

    #[test]
    fn empty_pick_list_withdraws() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let voter = add_voter(&mut entry);

        assert!(entry.apply_ballot(voter, &ballot(cat, &[a]), Utc::now()).is_ok());
        assert!(entry.apply_ballot(voter, &ballot(cat, &[]), Utc::now()).is_ok());
        assert!(entry.votes_of(voter).is_empty());
    }

    #[test]
    fn invalid_line_leaves_all_votes_unchanged() {
        let mut entry = make_entry();
        let cat1 = add_category(&mut entry, "Best Dressed", 1);
        let cat2 = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat1, "An");
        let voter = add_voter(&mut entry);
        assert!(entry.apply_ballot(voter, &ballot(cat1, &[a]), Utc::now()).is_ok());

        // Second line names a candidate from the wrong category.
        let selections = vec![
            BallotSelection {
                category_id: cat1,
                candidate_ids: vec![],
            },
            BallotSelection {
                category_id: cat2,
                candidate_ids: vec![a],
            },
        ];
        assert!(entry.apply_ballot(voter, &selections, Utc::now()).is_err());
        assert_eq!(entry.votes_of(voter).len(), 1);
    }

    #[test]
    fn repeated_category_is_rejected() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 2);
        let a = add_candidate(&mut entry, cat, "An");
        let voter = add_voter(&mut entry);
        let selections = vec![
            BallotSelection {
                category_id: cat,
                candidate_ids: vec![a],
            },
            BallotSelection {
                category_id: cat,
                candidate_ids: vec![a],
            },
        ];
        assert!(matches!(
            entry.apply_ballot(voter, &selections, Utc::now()),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn closed_window_rejects_ballot() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let voter = add_voter(&mut entry);
        entry.event.voting_ends_at = Some(Utc::now() - chrono::Duration::minutes(1));

        assert!(matches!(
            entry.apply_ballot(voter, &ballot(cat, &[a]), Utc::now()),
            Err(AppError::VotingClosed(_))
        ));
    }

    #[test]
    fn checkin_requirement_is_enforced() {
        let mut entry = make_entry();
        entry.event.settings.checkin.require_checkin_to_vote = true;
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let voter = add_voter(&mut entry);

        assert!(matches!(
            entry.apply_ballot(voter, &ballot(cat, &[a]), Utc::now()),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(entry.check_in(voter, Utc::now()), Ok(true)));
        assert!(matches!(entry.check_in(voter, Utc::now()), Ok(false)));
        assert!(entry.apply_ballot(voter, &ballot(cat, &[a]), Utc::now()).is_ok());
    }

    #[test]
    fn removing_category_cascades() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let voter = add_voter(&mut entry);
        assert!(entry.apply_ballot(voter, &ballot(cat, &[a]), Utc::now()).is_ok());

        assert!(entry.remove_category(cat, Utc::now()).is_ok());
        assert!(entry.candidates.is_empty());
        assert!(entry.votes.is_empty());
    }

    #[test]
    fn removing_candidate_drops_its_votes() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 2);
        let a = add_candidate(&mut entry, cat, "An");
        let b = add_candidate(&mut entry, cat, "Binh");
        let voter = add_voter(&mut entry);
        assert!(entry.apply_ballot(voter, &ballot(cat, &[a, b]), Utc::now()).is_ok());

        assert!(entry.remove_candidate(a, Utc::now()).is_ok());
        assert_eq!(entry.votes.len(), 1);
    }

    #[test]
    fn participant_limit_is_enforced() {
        let mut entry = make_entry();
        entry.event.participant_limit = Some(1);
        add_voter(&mut entry);
        assert!(matches!(
            entry.register_voter(None, None, false, false, Utc::now()),
            Err(AppError::LimitExceeded(_))
        ));
    }

    #[test]
    fn duplicate_phone_is_a_conflict() {
        let mut entry = make_entry();
        let phone = Some("0912345678".to_string());
        assert!(entry
            .register_voter(phone.clone(), None, true, true, Utc::now())
            .is_ok());
        assert!(matches!(
            entry.register_voter(phone, None, true, true, Utc::now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn zero_allowance_is_rejected() {
        let mut entry = make_entry();
        let result = entry.add_category(
            NewCategory {
                name: "Broken".to_string(),
                emoji: None,
                description: None,
                max_votes_per_voter: 0,
                display_order: None,
            },
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn tally_includes_zero_counts() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let b = add_candidate(&mut entry, cat, "Binh");
        let voter = add_voter(&mut entry);
        assert!(entry.apply_ballot(voter, &ballot(cat, &[b]), Utc::now()).is_ok());

        let counts = entry.tally(None);
        assert_eq!(counts.len(), 2);
        let votes_for = |id| counts.iter().find(|c| c.candidate_id == id).map(|c| c.votes);
        assert_eq!(votes_for(a), Some(0));
        assert_eq!(votes_for(b), Some(1));
    }
}
