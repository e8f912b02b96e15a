//! An in-memory [`BallotStore`] used to exercise the coordinator without a
//! database. A single mutex stands in for the store's atomic commit, and a
//! conflict counter lets tests drive the retry path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    db::{
        candidate::{Candidate, CandidateCore},
        voter::{Voter, VoterCore},
    },
    mongodb::Id,
};

use super::{BallotStore, VoteError};

#[derive(Default)]
struct MemoryState {
    voters: HashMap<Id, VoterCore>,
    candidates: HashMap<Id, CandidateCore>,
}

#[derive(Default)]
pub struct MemoryBallotStore {
    state: Mutex<MemoryState>,
    conflicts: AtomicU32,
}

impl MemoryBallotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a voter who has not voted, returning their ID.
    pub fn add_voter(&self) -> Id {
        let id = Id::new();
        self.state
            .lock()
            .unwrap()
            .voters
            .insert(id, VoterCore::new());
        id
    }

    /// Register a candidate, returning its ID.
    pub fn add_candidate(&self, candidate: CandidateCore) -> Id {
        let id = Id::new();
        self.state.lock().unwrap().candidates.insert(id, candidate);
        id
    }

    /// Make the next `count` calls to `record_vote` fail with a conflict.
    pub fn fail_next_writes(&self, count: u32) {
        self.conflicts.store(count, Ordering::SeqCst);
    }

    fn take_conflict(&self) -> bool {
        self.conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryBallotStore {
    async fn voter(&self, voter_id: Id) -> Result<Option<Voter>> {
        let state = self.state.lock().unwrap();
        Ok(state.voters.get(&voter_id).map(|voter| Voter {
            id: voter_id,
            voter: voter.clone(),
        }))
    }

    async fn candidate(&self, candidate_id: Id) -> Result<Option<Candidate>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .candidates
            .get(&candidate_id)
            .map(|candidate| Candidate {
                id: candidate_id,
                candidate: candidate.clone(),
            }))
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .candidates
            .iter()
            .map(|(id, candidate)| Candidate {
                id: *id,
                candidate: candidate.clone(),
            })
            .collect())
    }

    async fn record_vote(
        &self,
        voter_id: Id,
        candidate_id: Id,
        cast_at: DateTime<Utc>,
    ) -> Result<()> {
        if self.take_conflict() {
            return Err(VoteError::StorageConflict.into());
        }

        let mut state = self.state.lock().unwrap();

        // Validate both sides before touching either, so a rejection leaves
        // no partial state.
        if !state.voters.contains_key(&voter_id) {
            return Err(VoteError::VoterNotFound(voter_id).into());
        }
        if !state.candidates.contains_key(&candidate_id) {
            return Err(VoteError::CandidateNotFound(candidate_id).into());
        }

        let voter = state.voters.get_mut(&voter_id).unwrap();
        if !voter.mark_voted(candidate_id, cast_at) {
            return Err(VoteError::AlreadyVoted.into());
        }
        let candidate = state.candidates.get_mut(&candidate_id).unwrap();
        candidate.push_vote(voter_id, cast_at);
        debug_assert!(candidate.tally_consistent());

        Ok(())
    }
}
