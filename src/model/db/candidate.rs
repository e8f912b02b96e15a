use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A single recorded vote: who cast it and when.
///
/// Vote order is insertion order; the list is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter_id: Id,
    pub voted_at: DateTime<Utc>,
}

/// Core candidate data, as stored in the database.
///
/// Invariant: `total_votes == votes.len()` after any committed mutation.
/// Only [`push_vote`](CandidateCore::push_vote) may touch the vote list, so
/// the invariant holds by construction; metadata edits are scoped to the
/// descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub party: String,
    /// Reference to the candidate's photo, e.g. an uploaded file name.
    pub photo: String,
    /// Reference to the candidate's ballot symbol.
    pub symbol: String,
    pub votes: Vec<VoteRecord>,
    pub total_votes: u64,
    pub created_at: DateTime<Utc>,
}

impl CandidateCore {
    /// Create a new candidate with no votes.
    pub fn new(name: String, party: String, photo: String, symbol: String) -> Self {
        Self {
            name,
            party,
            photo,
            symbol,
            votes: Vec::new(),
            total_votes: 0,
            created_at: Utc::now(),
        }
    }

    /// Append a vote and recompute the running total.
    pub fn push_vote(&mut self, voter_id: Id, voted_at: DateTime<Utc>) {
        self.votes.push(VoteRecord { voter_id, voted_at });
        self.total_votes = self.votes.len() as u64;
    }

    /// Does this candidate satisfy the tally invariant?
    pub fn tally_consistent(&self) -> bool {
        self.total_votes as usize == self.votes.len()
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    /// Wrap a new candidate with a fresh ID.
    pub fn new(candidate: NewCandidate) -> Self {
        Self {
            id: Id::new(),
            candidate,
        }
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example() -> Self {
            Self::new(
                "Ada Lovelace".to_string(),
                "Analytical Party".to_string(),
                "candidate_ada.jpg".to_string(),
                "symbol_gear.png".to_string(),
            )
        }

        pub fn example2() -> Self {
            Self::new(
                "Charles Babbage".to_string(),
                "Difference Party".to_string(),
                "candidate_charles.jpg".to_string(),
                "symbol_cog.png".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_tracks_vote_list() {
        let mut candidate = CandidateCore::example();
        assert!(candidate.tally_consistent());
        assert_eq!(candidate.total_votes, 0);

        for expected in 1..=3 {
            candidate.push_vote(Id::new(), Utc::now());
            assert!(candidate.tally_consistent());
            assert_eq!(candidate.total_votes, expected);
        }

        // Insertion order is preserved.
        let first = candidate.votes.first().unwrap().voted_at;
        let last = candidate.votes.last().unwrap().voted_at;
        assert!(first <= last);
    }
}
