//! The on-chain mirror: an adapter over the ballot smart contract, which
//! enforces the same one-vote-per-address invariant under the ledger's own
//! transaction atomicity. This module models only the contract's externally
//! observed behaviour; nothing here synchronises the on-chain tally with the
//! off-chain one.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ballot::VoteError;

mod artifacts;
mod contract;
mod http;

pub use artifacts::{ArtifactError, CandidateEntry, CandidatesFile, ContractInfo, Deployment};
pub use contract::{await_confirmation, sync_candidates, BallotContract, SyncAction};
pub use http::HttpLedger;

/// Candidate IDs are assigned by the contract, starting from 1.
pub type ChainCandidateId = u64;

/// A ledger transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl Display for TxHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TxHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

/// The fixed-order record the contract returns for a candidate.
type ChainCandidateRecord = (ChainCandidateId, String, String, String, u64, bool);

/// A candidate as stored by the on-chain ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ChainCandidateRecord", into = "ChainCandidateRecord")]
pub struct ChainCandidate {
    pub id: ChainCandidateId,
    pub name: String,
    pub party: String,
    pub image_hash: String,
    pub vote_count: u64,
    pub is_active: bool,
}

impl From<ChainCandidateRecord> for ChainCandidate {
    fn from((id, name, party, image_hash, vote_count, is_active): ChainCandidateRecord) -> Self {
        Self {
            id,
            name,
            party,
            image_hash,
            vote_count,
            is_active,
        }
    }
}

impl From<ChainCandidate> for ChainCandidateRecord {
    fn from(candidate: ChainCandidate) -> Self {
        (
            candidate.id,
            candidate.name,
            candidate.party,
            candidate.image_hash,
            candidate.vote_count,
            candidate.is_active,
        )
    }
}

/// The lifecycle of a submitted ledger transaction.
///
/// `Pending` after a confirmation timeout does not mean failure: the
/// transaction may still confirm later, so callers re-query status instead
/// of resubmitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TxStatus {
    Pending,
    #[serde(rename_all = "camelCase")]
    Confirmed {
        block_number: u64,
    },
    Failed {
        reason: String,
    },
}

/// Errors from the ledger boundary.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Ledger RPC error: {0}")]
    Rpc(String),
    #[error("Transaction reverted: {0}")]
    Reverted(String),
}

impl From<LedgerError> for VoteError {
    /// Fold a ledger failure into the vote taxonomy.
    ///
    /// The contract reverts with a message containing "already voted" when
    /// the calling address's has-voted flag is set; we match on the message
    /// rather than an error code, as that is the only stable part of the
    /// revert surface.
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::Reverted(reason) if reason.contains("already voted") => {
                VoteError::AlreadyVoted
            }
            _ => VoteError::LedgerTransactionFailed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn chain_candidate_is_a_fixed_order_record() {
        let raw = json!([3, "Ada Lovelace", "Analytical Party", "QmHash", 7, true]);
        let candidate: ChainCandidate = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(candidate.id, 3);
        assert_eq!(candidate.vote_count, 7);
        assert!(candidate.is_active);
        assert_eq!(serde_json::to_value(&candidate).unwrap(), raw);
    }

    #[test]
    fn tx_status_wire_format() {
        let confirmed: TxStatus =
            serde_json::from_value(json!({"status": "confirmed", "blockNumber": 42})).unwrap();
        assert_eq!(confirmed, TxStatus::Confirmed { block_number: 42 });

        let pending: TxStatus = serde_json::from_value(json!({"status": "pending"})).unwrap();
        assert_eq!(pending, TxStatus::Pending);
    }

    #[test]
    fn already_voted_revert_maps_to_vote_error() {
        let err = LedgerError::Reverted("Voting: sender has already voted".to_string());
        assert_eq!(VoteError::from(err), VoteError::AlreadyVoted);

        let other = LedgerError::Rpc("gateway unreachable".to_string());
        match VoteError::from(other) {
            VoteError::LedgerTransactionFailed(reason) => {
                assert!(reason.contains("gateway unreachable"))
            }
            unexpected => panic!("expected LedgerTransactionFailed, got {unexpected:?}"),
        }
    }
}
