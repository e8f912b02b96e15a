//! The vote-casting core: the ballot storage abstraction, the transaction
//! coordinator that owns the one-vote-per-voter transition, and the results
//! aggregator.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::Result;
use crate::model::{
    db::{Candidate, Voter},
    mongodb::Id,
};

mod coordinator;
#[cfg(test)]
pub mod memory;
mod mongo;
mod results;

pub use coordinator::{Coordinator, VoteAck};
pub use mongo::MongoBallotStore;
pub use results::{compute_results, ElectionResults};

/// Why a vote attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("No voter found with ID {0}")]
    VoterNotFound(Id),
    #[error("No candidate found with ID {0}")]
    CandidateNotFound(Id),
    #[error("You have already voted")]
    AlreadyVoted,
    #[error("Concurrent write detected while recording the vote")]
    StorageConflict,
    #[error("Ledger transaction failed: {0}")]
    LedgerTransactionFailed(String),
}

/// The abstract ballot capability over shared voter and candidate state.
///
/// The coordinator depends on this interface rather than a concrete store so
/// the casting logic can be exercised against an in-memory fake.
#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// Load a voter by ID.
    async fn voter(&self, voter_id: Id) -> Result<Option<Voter>>;

    /// Load a candidate by ID.
    async fn candidate(&self, candidate_id: Id) -> Result<Option<Candidate>>;

    /// Load every candidate, in no particular order.
    async fn candidates(&self) -> Result<Vec<Candidate>>;

    /// Atomically record a vote: append to the candidate's vote list,
    /// recompute its total, and mark the voter as having voted, as one unit.
    ///
    /// The voter's unvoted precondition is re-checked inside the atomic step,
    /// so two concurrent calls for the same voter commit exactly one vote.
    /// Fails with [`VoteError::AlreadyVoted`], [`VoteError::VoterNotFound`],
    /// [`VoteError::CandidateNotFound`], or [`VoteError::StorageConflict`]
    /// (retryable), leaving no partial state behind.
    async fn record_vote(
        &self,
        voter_id: Id,
        candidate_id: Id,
        cast_at: DateTime<Utc>,
    ) -> Result<()>;
}
