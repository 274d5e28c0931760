//! Voting service: ballots, vote submission and live tallies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::tally_updated;
use crate::domain::event::{Candidate, Vote};
use crate::domain::event_entry::{BallotReceipt, BallotSelection, CandidateCount, EventEntry};
use crate::domain::identity::normalize_code;
use crate::domain::{CandidateId, CategoryId, DomainEvent, EventBus, EventId, EventRegistry, VoterId};
use crate::error::AppError;

/// One category of a voter's ballot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BallotCategory {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Award title.
    pub name: String,
    /// Optional emoji.
    pub emoji: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Candidates a voter may pick in this category.
    pub max_votes_per_voter: u32,
    /// Nominees in display order.
    pub candidates: Vec<Candidate>,
    /// Candidates the voter currently votes for.
    pub selected: Vec<CandidateId>,
}

/// Everything a guest needs to render the voting page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BallotView {
    /// Event identifier.
    pub event_id: EventId,
    /// Event name.
    pub event_name: String,
    /// Whether ballots are accepted right now.
    pub voting_open: bool,
    /// When voting closes, if scheduled.
    pub voting_ends_at: Option<DateTime<Utc>>,
    /// Whether the voter has checked in.
    pub checked_in: bool,
    /// Whether check-in is required before voting.
    pub require_checkin_to_vote: bool,
    /// Categories in display order.
    pub categories: Vec<BallotCategory>,
}

/// Live counts of one category.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveCategory {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Award title.
    pub name: String,
    /// Sum of the counts.
    pub total_votes: u64,
    /// Counts for every candidate, in display order.
    pub counts: Vec<CandidateCount>,
}

/// Live counts of an event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveTally {
    /// Event identifier.
    pub event_id: EventId,
    /// Categories in display order.
    pub categories: Vec<LiveCategory>,
    /// When the counts were read.
    pub generated_at: DateTime<Utc>,
}

/// Orchestration layer for guest voting.
#[derive(Debug, Clone)]
pub struct VotingService {
    registry: Arc<EventRegistry>,
    event_bus: EventBus,
}

impl VotingService {
    /// Creates a new `VotingService`.
    #[must_use]
    pub fn new(registry: Arc<EventRegistry>, event_bus: EventBus) -> Self {
        Self {
            registry,
            event_bus,
        }
    }

    /// Returns the ballot of a voter with their current selections.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] or [`AppError::VoterNotFound`].
    pub async fn ballot(&self, event_id: EventId, voter_id: VoterId) -> Result<BallotView, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        let voter = entry.voter(voter_id)?;
        let mine = entry.votes_of(voter_id);

        let categories = entry
            .ordered_categories()
            .into_iter()
            .map(|category| BallotCategory {
                category_id: category.id,
                name: category.name.clone(),
                emoji: category.emoji.clone(),
                description: category.description.clone(),
                max_votes_per_voter: category.max_votes_per_voter,
                candidates: entry.candidates_in(category.id).into_iter().cloned().collect(),
                selected: mine
                    .iter()
                    .filter(|v| v.category_id == category.id)
                    .map(|v| v.candidate_id)
                    .collect(),
            })
            .collect();

        Ok(BallotView {
            event_id,
            event_name: entry.event.name.clone(),
            voting_open: entry.event.is_voting_open(Utc::now()),
            voting_ends_at: entry.event.voting_ends_at,
            checked_in: voter.checked_in_at.is_some(),
            require_checkin_to_vote: entry.event.settings.checkin.require_checkin_to_vote,
            categories,
        })
    }

    /// Submits a ballot with replace semantics.
    ///
    /// The ballot is validated and applied under the event's write lock,
    /// so concurrent readers never see a category with the old votes
    /// deleted and the new ones missing. Emits `VotesReplaced` and one
    /// `TallyUpdated` per named category.
    ///
    /// # Errors
    ///
    /// Propagates the validation errors of [`EventEntry::apply_ballot`];
    /// nothing is recorded on error.
    pub async fn submit_ballot(
        &self,
        event_id: EventId,
        voter_id: VoterId,
        selections: &[BallotSelection],
    ) -> Result<BallotReceipt, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;
        let now = Utc::now();
        let receipt = entry.apply_ballot(voter_id, selections, now)?;
        let tallies: Vec<DomainEvent> = receipt
            .replaced_categories
            .iter()
            .map(|category_id| tally_updated(&entry, *category_id, now))
            .collect();
        drop(entry);

        let _ = self.event_bus.publish(DomainEvent::VotesReplaced {
            event_id,
            voter_id,
            category_ids: receipt.replaced_categories.clone(),
            votes_recorded: receipt.votes_recorded,
            timestamp: now,
        });
        for tally in tallies {
            let _ = self.event_bus.publish(tally);
        }

        tracing::info!(
            %event_id,
            %voter_id,
            categories = receipt.replaced_categories.len(),
            votes = receipt.votes_recorded,
            "ballot submitted"
        );
        Ok(receipt)
    }

    /// Returns the votes currently held by a voter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`] or [`AppError::VoterNotFound`].
    pub async fn my_votes(&self, event_id: EventId, voter_id: VoterId) -> Result<Vec<Vote>, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        entry.voter(voter_id)?;
        Ok(entry.votes_of(voter_id).into_iter().cloned().collect())
    }

    /// Returns live counts for the event behind a public code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EventNotFound`], or [`AppError::Forbidden`] when
    /// the event does not publish live results.
    pub async fn live_tally_by_code(&self, code: &str) -> Result<LiveTally, AppError> {
        let entry_lock = self.registry.get_by_code(&normalize_code(code)).await?;
        let entry = entry_lock.read().await;
        live_tally(&entry)
    }

    /// Returns live counts for an event.
    ///
    /// # Errors
    ///
    /// Same as [`Self::live_tally_by_code`].
    pub async fn live_tally(&self, event_id: EventId) -> Result<LiveTally, AppError> {
        let entry_lock = self.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        live_tally(&entry)
    }
}

fn live_tally(entry: &EventEntry) -> Result<LiveTally, AppError> {
    if !entry.event.settings.show_live_results {
        return Err(AppError::Forbidden(format!(
            "event {} does not publish live results",
            entry.event.id
        )));
    }
    let counts = entry.tally(None);
    let categories = entry
        .ordered_categories()
        .into_iter()
        .map(|category| {
            let counts: Vec<CandidateCount> = counts
                .iter()
                .filter(|c| c.category_id == category.id)
                .copied()
                .collect();
            LiveCategory {
                category_id: category.id,
                name: category.name.clone(),
                total_votes: counts.iter().map(|c| c.votes).sum(),
                counts,
            }
        })
        .collect();
    Ok(LiveTally {
        event_id: entry.event.id,
        categories,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event_entry::tests::{add_candidate, add_category, add_voter, make_entry};

    async fn setup(max: u32) -> (VotingService, EventId, VoterId, CategoryId, Vec<CandidateId>) {
        let registry = Arc::new(EventRegistry::new());
        let mut entry = make_entry();
        let category = add_category(&mut entry, "Best Dressed", max);
        let candidates = vec![
            add_candidate(&mut entry, category, "An"),
            add_candidate(&mut entry, category, "Binh"),
            add_candidate(&mut entry, category, "Chi"),
        ];
        let voter = add_voter(&mut entry);
        let event_id = entry.event.id;
        let Ok(_) = registry.insert(entry).await else {
            panic!("insert failed");
        };
        let service = VotingService::new(registry, EventBus::new(100));
        (service, event_id, voter, category, candidates)
    }

    fn pick(category_id: CategoryId, ids: &[CandidateId]) -> Vec<BallotSelection> {
        vec![BallotSelection {
            category_id,
            candidate_ids: ids.to_vec(),
        }]
    }

    #[tokio::test]
    async fn resubmission_replaces_votes() {
        let (service, event_id, voter, category, c) = setup(2).await;
        let [a, b, third] = c.as_slice() else {
            panic!("three candidates expected");
        };

        let Ok(receipt) = service
            .submit_ballot(event_id, voter, &pick(category, &[*a, *b]))
            .await
        else {
            panic!("first ballot failed");
        };
        assert_eq!(receipt.votes_recorded, 2);

        let Ok(receipt) = service
            .submit_ballot(event_id, voter, &pick(category, &[*third]))
            .await
        else {
            panic!("second ballot failed");
        };
        assert_eq!(receipt.votes_recorded, 1);

        let Ok(votes) = service.my_votes(event_id, voter).await else {
            panic!("my_votes failed");
        };
        assert_eq!(votes.len(), 1);
        assert_eq!(votes.first().map(|v| v.candidate_id), Some(*third));
    }

    #[tokio::test]
    async fn over_limit_ballot_records_nothing() {
        let (service, event_id, voter, category, c) = setup(2).await;
        assert!(matches!(
            service.submit_ballot(event_id, voter, &pick(category, &c)).await,
            Err(AppError::InvalidRequest(_))
        ));
        let Ok(votes) = service.my_votes(event_id, voter).await else {
            panic!("my_votes failed");
        };
        assert!(votes.is_empty());
    }

    #[tokio::test]
    async fn submission_emits_replacement_then_tally() {
        let (service, event_id, voter, category, c) = setup(1).await;
        let mut rx = service.event_bus.subscribe();
        let Some(first) = c.first() else {
            panic!("no candidate");
        };
        assert!(
            service
                .submit_ballot(event_id, voter, &pick(category, &[*first]))
                .await
                .is_ok()
        );

        let Ok(DomainEvent::VotesReplaced { votes_recorded, .. }) = rx.recv().await else {
            panic!("expected VotesReplaced");
        };
        assert_eq!(votes_recorded, 1);
        let Ok(DomainEvent::TallyUpdated {
            counts,
            total_votes,
            ..
        }) = rx.recv().await
        else {
            panic!("expected TallyUpdated");
        };
        assert_eq!(total_votes, 1);
        assert_eq!(counts.len(), 3);
    }

    #[tokio::test]
    async fn ballot_view_shows_selection() {
        let (service, event_id, voter, category, c) = setup(2).await;
        let Some(first) = c.first() else {
            panic!("no candidate");
        };
        assert!(
            service
                .submit_ballot(event_id, voter, &pick(category, &[*first]))
                .await
                .is_ok()
        );
        let Ok(view) = service.ballot(event_id, voter).await else {
            panic!("ballot failed");
        };
        let Some(row) = view.categories.first() else {
            panic!("no category");
        };
        assert_eq!(row.candidates.len(), 3);
        assert_eq!(row.selected, vec![*first]);
        assert!(view.voting_open);
    }

    #[tokio::test]
    async fn live_tally_requires_opt_in() {
        let (service, event_id, _, _, _) = setup(1).await;
        assert!(matches!(
            service.live_tally(event_id).await,
            Err(AppError::Forbidden(_))
        ));
        let Ok(lock) = service.registry.get(event_id).await else {
            panic!("event missing");
        };
        lock.write().await.event.settings.show_live_results = true;
        let Ok(live) = service.live_tally_by_code("gala26").await else {
            panic!("live tally failed");
        };
        assert_eq!(live.categories.len(), 1);
    }
}
