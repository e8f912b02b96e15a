use chrono::{DateTime, Utc};
use rand::Rng;
use rocket::tokio::time::{sleep, Duration};

use crate::error::{Error, Result};
use crate::model::{api::vote::VoterStatus, mongodb::Id};

use super::{BallotStore, VoteError};

/// How many times a conflicted write is retried before giving up.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Acknowledgement of a committed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteAck {
    pub candidate_id: Id,
    pub cast_at: DateTime<Utc>,
}

/// The vote transaction coordinator: owns the atomic one-vote-per-voter
/// state transition across the voter registry and the candidate ledger.
pub struct Coordinator<S> {
    store: S,
}

impl<S> Coordinator<S>
where
    S: BallotStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cast a vote on behalf of the given voter.
    ///
    /// Preconditions are checked in order (voter exists, voter has not voted,
    /// candidate exists) before the store applies the mutation atomically.
    /// Write conflicts are retried transparently a bounded number of times;
    /// every other error is terminal and reported to the caller verbatim.
    pub async fn cast_vote(&self, voter_id: Id, candidate_id: Id) -> Result<VoteAck> {
        let mut attempt = 0;
        loop {
            match self.try_cast(voter_id, candidate_id).await {
                Err(Error::Vote(VoteError::StorageConflict)) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!("Vote by {voter_id} hit a write conflict, retrying (attempt {attempt})");
                    // Jittered pause so colliding writers do not re-collide.
                    let pause = {
                        let mut rng = rand::thread_rng();
                        Duration::from_millis(rng.gen_range(5..25))
                    };
                    sleep(pause).await;
                }
                Err(Error::Vote(VoteError::AlreadyVoted)) if attempt > 0 => {
                    // The conflicted attempt may in fact have committed before
                    // the conflict was reported. Trust the committed state: if
                    // the recorded vote is the one we were asked to cast, this
                    // request cast it.
                    return self.committed_ack(voter_id, candidate_id).await;
                }
                Err(err) => return Err(err),
                Ok(ack) => {
                    info!("Voter {voter_id} cast their vote for candidate {candidate_id}");
                    return Ok(ack);
                }
            }
        }
    }

    /// Acknowledge a vote found already committed for this voter, or report
    /// `AlreadyVoted` if the committed vote is for a different candidate.
    async fn committed_ack(&self, voter_id: Id, candidate_id: Id) -> Result<VoteAck> {
        let voter = self
            .store
            .voter(voter_id)
            .await?
            .ok_or(VoteError::VoterNotFound(voter_id))?;
        match (voter.voted_for, voter.voted_at) {
            (Some(voted_for), Some(cast_at)) if voted_for == candidate_id => {
                info!("Voter {voter_id} cast their vote for candidate {candidate_id}");
                Ok(VoteAck {
                    candidate_id,
                    cast_at,
                })
            }
            _ => Err(VoteError::AlreadyVoted.into()),
        }
    }

    async fn try_cast(&self, voter_id: Id, candidate_id: Id) -> Result<VoteAck> {
        let voter = self
            .store
            .voter(voter_id)
            .await?
            .ok_or(VoteError::VoterNotFound(voter_id))?;
        if voter.has_voted {
            return Err(VoteError::AlreadyVoted.into());
        }

        let candidate = self
            .store
            .candidate(candidate_id)
            .await?
            .ok_or(VoteError::CandidateNotFound(candidate_id))?;

        // The store re-checks the unvoted precondition inside the atomic
        // step; the read above exists to report precondition failures in
        // the contract's order without mutating anything.
        let cast_at = Utc::now();
        self.store
            .record_vote(voter_id, candidate.id, cast_at)
            .await?;

        Ok(VoteAck {
            candidate_id: candidate.id,
            cast_at,
        })
    }

    /// A voter's own vote status. Pure read of committed state.
    pub async fn voter_status(&self, voter_id: Id) -> Result<VoterStatus> {
        let voter = self
            .store
            .voter(voter_id)
            .await?
            .ok_or(VoteError::VoterNotFound(voter_id))?;

        match (voter.voted_for, voter.voted_at) {
            (Some(candidate_id), Some(voted_at)) => {
                let candidate = self
                    .store
                    .candidate(candidate_id)
                    .await?
                    .ok_or(VoteError::CandidateNotFound(candidate_id))?;
                Ok(VoterStatus::voted(&candidate, voted_at))
            }
            _ => Ok(VoterStatus::not_voted()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use rocket::tokio;

    use crate::ballot::memory::MemoryBallotStore;
    use crate::model::db::{candidate::CandidateCore, Candidate, Voter};

    use super::*;

    fn coordinator() -> Coordinator<MemoryBallotStore> {
        Coordinator::new(MemoryBallotStore::new())
    }

    /// A store double for conflict-path races. It can commit a write and
    /// still report it as conflicted (a lost commit acknowledgement), or
    /// commit a rival same-voter vote before reporting the conflict.
    #[derive(Default)]
    struct RacingStore {
        inner: MemoryBallotStore,
        lost_acks: AtomicU32,
        rival_vote: Mutex<Option<Id>>,
    }

    impl RacingStore {
        fn new() -> Self {
            Self::default()
        }

        fn add_voter(&self) -> Id {
            self.inner.add_voter()
        }

        fn add_candidate(&self, candidate: CandidateCore) -> Id {
            self.inner.add_candidate(candidate)
        }

        /// Commit the next `count` writes but report them as conflicts.
        fn lose_next_acks(&self, count: u32) {
            self.lost_acks.store(count, Ordering::SeqCst);
        }

        /// Commit a vote for this candidate instead of the requested one on
        /// the next write, then report a conflict.
        fn set_rival_vote(&self, candidate_id: Id) {
            *self.rival_vote.lock().unwrap() = Some(candidate_id);
        }

        fn take_lost_ack(&self) -> bool {
            self.lost_acks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_ok()
        }
    }

    #[rocket::async_trait]
    impl BallotStore for RacingStore {
        async fn voter(&self, voter_id: Id) -> Result<Option<Voter>> {
            self.inner.voter(voter_id).await
        }

        async fn candidate(&self, candidate_id: Id) -> Result<Option<Candidate>> {
            self.inner.candidate(candidate_id).await
        }

        async fn candidates(&self) -> Result<Vec<Candidate>> {
            self.inner.candidates().await
        }

        async fn record_vote(
            &self,
            voter_id: Id,
            candidate_id: Id,
            cast_at: DateTime<Utc>,
        ) -> Result<()> {
            let rival = self.rival_vote.lock().unwrap().take();
            if let Some(rival_id) = rival {
                self.inner.record_vote(voter_id, rival_id, cast_at).await?;
                return Err(VoteError::StorageConflict.into());
            }
            self.inner
                .record_vote(voter_id, candidate_id, cast_at)
                .await?;
            if self.take_lost_ack() {
                return Err(VoteError::StorageConflict.into());
            }
            Ok(())
        }
    }

    #[rocket::async_test]
    async fn casts_a_single_vote() {
        let coordinator = coordinator();
        let candidate_id = coordinator.store().add_candidate(CandidateCore::example());
        let voter_id = coordinator.store().add_voter();

        // Seed three existing votes from other voters.
        for _ in 0..3 {
            let other = coordinator.store().add_voter();
            coordinator.cast_vote(other, candidate_id).await.unwrap();
        }

        let ack = coordinator.cast_vote(voter_id, candidate_id).await.unwrap();
        assert_eq!(ack.candidate_id, candidate_id);

        let candidate = coordinator
            .store()
            .candidate(candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.total_votes, 4);
        assert!(candidate.tally_consistent());

        let status = coordinator.voter_status(voter_id).await.unwrap();
        assert!(status.has_voted);
        assert_eq!(*status.candidate.unwrap().id, candidate_id);
    }

    #[rocket::async_test]
    async fn rejects_unknown_voter_and_candidate() {
        let coordinator = coordinator();
        let candidate_id = coordinator.store().add_candidate(CandidateCore::example());
        let voter_id = coordinator.store().add_voter();

        let ghost = Id::new();
        match coordinator.cast_vote(ghost, candidate_id).await {
            Err(Error::Vote(VoteError::VoterNotFound(id))) => assert_eq!(id, ghost),
            other => panic!("expected VoterNotFound, got {other:?}"),
        }

        match coordinator.cast_vote(voter_id, ghost).await {
            Err(Error::Vote(VoteError::CandidateNotFound(id))) => assert_eq!(id, ghost),
            other => panic!("expected CandidateNotFound, got {other:?}"),
        }

        // Neither rejection recorded anything.
        let candidate = coordinator
            .store()
            .candidate(candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.total_votes, 0);
        assert!(!coordinator.voter_status(voter_id).await.unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn second_vote_is_rejected_and_changes_nothing() {
        let coordinator = coordinator();
        let first = coordinator.store().add_candidate(CandidateCore::example());
        let second = coordinator.store().add_candidate(CandidateCore::example2());
        let voter_id = coordinator.store().add_voter();

        coordinator.cast_vote(voter_id, first).await.unwrap();

        match coordinator.cast_vote(voter_id, second).await {
            Err(Error::Vote(VoteError::AlreadyVoted)) => {}
            other => panic!("expected AlreadyVoted, got {other:?}"),
        }

        let second_candidate = coordinator.store().candidate(second).await.unwrap().unwrap();
        assert_eq!(second_candidate.total_votes, 0);

        let status = coordinator.voter_status(voter_id).await.unwrap();
        assert_eq!(*status.candidate.unwrap().id, first);
    }

    #[rocket::async_test]
    async fn concurrent_same_voter_commits_exactly_once() {
        let coordinator = Arc::new(coordinator());
        let candidate_id = coordinator.store().add_candidate(CandidateCore::example());
        let voter_id = coordinator.store().add_voter();

        let tasks = (0..2)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.cast_vote(voter_id, candidate_id).await })
            })
            .collect::<Vec<_>>();

        let mut successes = 0;
        let mut already_voted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::Vote(VoteError::AlreadyVoted)) => already_voted += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(already_voted, 1);

        let candidate = coordinator
            .store()
            .candidate(candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.total_votes, 1);
        assert!(candidate.tally_consistent());
    }

    #[rocket::async_test]
    async fn no_lost_updates_across_a_hundred_voters() {
        const VOTERS: usize = 100;

        let coordinator = Arc::new(coordinator());
        let candidate_id = coordinator.store().add_candidate(CandidateCore::example());
        let voter_ids = (0..VOTERS)
            .map(|_| coordinator.store().add_voter())
            .collect::<Vec<_>>();

        let tasks = voter_ids
            .into_iter()
            .map(|voter_id| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.cast_vote(voter_id, candidate_id).await })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let candidate = coordinator
            .store()
            .candidate(candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.total_votes, VOTERS as u64);
        assert!(candidate.tally_consistent());
    }

    #[rocket::async_test]
    async fn conflicts_are_retried_transparently() {
        let coordinator = coordinator();
        let candidate_id = coordinator.store().add_candidate(CandidateCore::example());
        let voter_id = coordinator.store().add_voter();

        // Two conflicted attempts, then success on the third.
        coordinator.store().fail_next_writes(2);
        coordinator.cast_vote(voter_id, candidate_id).await.unwrap();

        let candidate = coordinator
            .store()
            .candidate(candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.total_votes, 1);
    }

    #[rocket::async_test]
    async fn unacknowledged_commit_is_still_reported_as_success() {
        let coordinator = Coordinator::new(RacingStore::new());
        let candidate_id = coordinator.store().add_candidate(CandidateCore::example());
        let voter_id = coordinator.store().add_voter();

        // The write commits but its result is reported as a conflict; the
        // retry then finds the voter has voted. The coordinator must
        // recognise the committed vote as this request's own, not reject it.
        coordinator.store().lose_next_acks(1);
        let ack = coordinator.cast_vote(voter_id, candidate_id).await.unwrap();
        assert_eq!(ack.candidate_id, candidate_id);

        let candidate = coordinator
            .store()
            .candidate(candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.total_votes, 1);
        assert!(candidate.tally_consistent());
        assert!(coordinator.voter_status(voter_id).await.unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn losing_a_same_voter_race_reports_already_voted() {
        let coordinator = Coordinator::new(RacingStore::new());
        let requested = coordinator.store().add_candidate(CandidateCore::example());
        let rival = coordinator.store().add_candidate(CandidateCore::example2());
        let voter_id = coordinator.store().add_voter();

        // A rival same-voter request wins the race during the conflict: the
        // committed vote is for a different candidate and must not be
        // claimed by this request.
        coordinator.store().set_rival_vote(rival);
        match coordinator.cast_vote(voter_id, requested).await {
            Err(Error::Vote(VoteError::AlreadyVoted)) => {}
            outcome => panic!("expected AlreadyVoted, got {outcome:?}"),
        }

        let requested_candidate = coordinator
            .store()
            .candidate(requested)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(requested_candidate.total_votes, 0);
        let rival_candidate = coordinator.store().candidate(rival).await.unwrap().unwrap();
        assert_eq!(rival_candidate.total_votes, 1);
    }

    #[rocket::async_test]
    async fn store_lists_every_candidate() {
        let coordinator = coordinator();
        coordinator.store().add_candidate(CandidateCore::example());
        coordinator.store().add_candidate(CandidateCore::example2());

        let listed = coordinator.store().candidates().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|candidate| candidate.total_votes == 0));
    }

    #[rocket::async_test]
    async fn exhausted_retries_surface_the_conflict() {
        let coordinator = coordinator();
        let candidate_id = coordinator.store().add_candidate(CandidateCore::example());
        let voter_id = coordinator.store().add_voter();

        // More conflicts than the coordinator will absorb.
        coordinator.store().fail_next_writes(MAX_CONFLICT_RETRIES + 1);
        match coordinator.cast_vote(voter_id, candidate_id).await {
            Err(Error::Vote(VoteError::StorageConflict)) => {}
            other => panic!("expected StorageConflict, got {other:?}"),
        }

        // Nothing was committed.
        assert!(!coordinator.voter_status(voter_id).await.unwrap().has_voted);
    }
}
