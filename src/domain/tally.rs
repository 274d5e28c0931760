//! Ranked results per category for the admin dashboard and LED screens.
//!
//! Candidates are ranked by descending vote count. Equal counts are
//! ordered by display order, then name, then ID, and share the same
//! competition rank (`1, 1, 3`).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::event_entry::EventEntry;
use super::{CandidateId, CategoryId, EventId, VoterId};

/// One candidate's position in a category leaderboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CandidateStanding {
    /// Competition rank (1-based; ties share a rank).
    pub rank: u32,
    /// Candidate identifier.
    pub candidate_id: CandidateId,
    /// Candidate name.
    pub name: String,
    /// Photo URL.
    pub photo_url: Option<String>,
    /// Votes received.
    pub votes: u64,
    /// Share of the category's votes in basis points (0–10 000).
    pub share_bps: u32,
}

/// Leaderboard of one category.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryResult {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Award title.
    pub name: String,
    /// Decorative emoji.
    pub emoji: Option<String>,
    /// Votes allowed per voter.
    pub max_votes_per_voter: u32,
    /// Votes cast in the category.
    pub total_votes: u64,
    /// Distinct voters who voted in the category.
    pub voter_count: u64,
    /// Ranked candidates.
    pub standings: Vec<CandidateStanding>,
    /// Candidates at the top count (empty when nobody voted).
    pub winners: Vec<CandidateId>,
}

/// Results of a whole event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventResults {
    /// Event identifier.
    pub event_id: EventId,
    /// Event name.
    pub event_name: String,
    /// Votes cast across all categories.
    pub total_votes: u64,
    /// Distinct voters across all categories.
    pub total_voters: u64,
    /// Per-category leaderboards in display order.
    pub categories: Vec<CategoryResult>,
    /// Computation timestamp.
    pub generated_at: DateTime<Utc>,
}

/// Computes ranked results for every category of an event.
#[must_use]
pub fn compute_results(entry: &EventEntry, now: DateTime<Utc>) -> EventResults {
    let mut counts: BTreeMap<CandidateId, u64> = BTreeMap::new();
    let mut voters_per_category: BTreeMap<CategoryId, BTreeSet<VoterId>> = BTreeMap::new();
    let mut all_voters: BTreeSet<VoterId> = BTreeSet::new();
    for vote in &entry.votes {
        *counts.entry(vote.candidate_id).or_insert(0) += 1;
        voters_per_category
            .entry(vote.category_id)
            .or_default()
            .insert(vote.voter_id);
        all_voters.insert(vote.voter_id);
    }

    let categories: Vec<CategoryResult> = entry
        .ordered_categories()
        .into_iter()
        .map(|category| {
            // candidates_in is already ordered by the tie-break keys, and
            // sort_by is stable, so sorting by count alone keeps them.
            let mut rows: Vec<(CandidateId, String, Option<String>, u64)> = entry
                .candidates_in(category.id)
                .into_iter()
                .map(|c| {
                    (
                        c.id,
                        c.name.clone(),
                        c.photo_url.clone(),
                        counts.get(&c.id).copied().unwrap_or(0),
                    )
                })
                .collect();
            rows.sort_by(|a, b| b.3.cmp(&a.3));

            let total_votes: u64 = rows.iter().map(|r| r.3).sum();
            let standings = rank_rows(rows, total_votes);
            let top = standings.first().map_or(0, |s| s.votes);
            let winners = if top == 0 {
                Vec::new()
            } else {
                standings
                    .iter()
                    .take_while(|s| s.votes == top)
                    .map(|s| s.candidate_id)
                    .collect()
            };

            CategoryResult {
                category_id: category.id,
                name: category.name.clone(),
                emoji: category.emoji.clone(),
                max_votes_per_voter: category.max_votes_per_voter,
                total_votes,
                voter_count: voters_per_category
                    .get(&category.id)
                    .map_or(0, |v| v.len() as u64),
                standings,
                winners,
            }
        })
        .collect();

    EventResults {
        event_id: entry.event.id,
        event_name: entry.event.name.clone(),
        total_votes: categories.iter().map(|c| c.total_votes).sum(),
        total_voters: all_voters.len() as u64,
        categories,
        generated_at: now,
    }
}

fn rank_rows(
    rows: Vec<(CandidateId, String, Option<String>, u64)>,
    total_votes: u64,
) -> Vec<CandidateStanding> {
    let mut standings = Vec::with_capacity(rows.len());
    let mut rank = 0_u32;
    let mut previous: Option<u64> = None;
    for (position, (candidate_id, name, photo_url, votes)) in rows.into_iter().enumerate() {
        if previous != Some(votes) {
            rank = u32::try_from(position).unwrap_or(u32::MAX).saturating_add(1);
            previous = Some(votes);
        }
        standings.push(CandidateStanding {
            rank,
            candidate_id,
            name,
            photo_url,
            votes,
            share_bps: share_bps(votes, total_votes),
        });
    }
    standings
}

fn share_bps(votes: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    u32::try_from(votes.saturating_mul(10_000) / total).unwrap_or(10_000)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event_entry::BallotSelection;
    use crate::domain::event_entry::tests::{add_candidate, add_category, add_voter, make_entry};

    fn vote(entry: &mut EventEntry, category_id: CategoryId, picks: &[CandidateId]) {
        let voter = add_voter(entry);
        let selections = [BallotSelection {
            category_id,
            candidate_ids: picks.to_vec(),
        }];
        if entry.apply_ballot(voter, &selections, Utc::now()).is_err() {
            panic!("ballot rejected");
        }
    }

    #[test]
    fn ranks_by_descending_votes() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let b = add_candidate(&mut entry, cat, "Binh");
        vote(&mut entry, cat, &[b]);
        vote(&mut entry, cat, &[b]);
        vote(&mut entry, cat, &[a]);

        let results = compute_results(&entry, Utc::now());
        let Some(category) = results.categories.first() else {
            panic!("missing category");
        };
        let order: Vec<CandidateId> = category.standings.iter().map(|s| s.candidate_id).collect();
        assert_eq!(order, vec![b, a]);
        assert_eq!(category.winners, vec![b]);
        assert_eq!(category.total_votes, 3);
        assert_eq!(category.voter_count, 3);
    }

    #[test]
    fn ties_share_rank_and_follow_display_order() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "Zed");
        let b = add_candidate(&mut entry, cat, "Anh");
        let c = add_candidate(&mut entry, cat, "Cuong");
        vote(&mut entry, cat, &[b]);
        vote(&mut entry, cat, &[a]);

        let results = compute_results(&entry, Utc::now());
        let Some(category) = results.categories.first() else {
            panic!("missing category");
        };
        let ranks: Vec<(CandidateId, u32)> = category
            .standings
            .iter()
            .map(|s| (s.candidate_id, s.rank))
            .collect();
        // `a` was created first so it has the lower display order.
        assert_eq!(ranks, vec![(a, 1), (b, 1), (c, 3)]);
        assert_eq!(category.winners, vec![a, b]);
    }

    #[test]
    fn empty_category_has_no_winner() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        add_candidate(&mut entry, cat, "An");

        let results = compute_results(&entry, Utc::now());
        let Some(category) = results.categories.first() else {
            panic!("missing category");
        };
        assert!(category.winners.is_empty());
        assert_eq!(category.standings.first().map(|s| s.share_bps), Some(0));
    }

    #[test]
    fn shares_are_basis_points() {
        let mut entry = make_entry();
        let cat = add_category(&mut entry, "MVP", 1);
        let a = add_candidate(&mut entry, cat, "An");
        let b = add_candidate(&mut entry, cat, "Binh");
        vote(&mut entry, cat, &[a]);
        vote(&mut entry, cat, &[a]);
        vote(&mut entry, cat, &[a]);
        vote(&mut entry, cat, &[b]);

        let results = compute_results(&entry, Utc::now());
        let Some(category) = results.categories.first() else {
            panic!("missing category");
        };
        let shares: Vec<u32> = category.standings.iter().map(|s| s.share_bps).collect();
        assert_eq!(shares, vec![7_500, 2_500]);
        assert_eq!(results.total_voters, 4);
    }
}
