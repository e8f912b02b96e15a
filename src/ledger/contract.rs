use rocket::tokio::time::{sleep, Duration, Instant};

use super::{CandidatesFile, ChainCandidate, ChainCandidateId, LedgerError, TxHash, TxStatus};

/// The externally observed operations of the on-chain ballot.
///
/// Every submitting call is a ledger transaction: it returns a hash
/// immediately and either fully commits or fully fails on-chain. The adapter
/// never retries a submission on its own, since resubmitting while a prior
/// transaction is pending risks double submission.
#[rocket::async_trait]
pub trait BallotContract: Send + Sync {
    /// Register a candidate. Owner-only on the contract side.
    async fn add_candidate(
        &self,
        name: &str,
        party: &str,
        image_hash: &str,
    ) -> Result<TxHash, LedgerError>;

    /// Cast the calling address's single vote.
    async fn vote(&self, candidate_id: ChainCandidateId) -> Result<TxHash, LedgerError>;

    /// Fetch one candidate's record.
    async fn candidate(&self, id: ChainCandidateId) -> Result<ChainCandidate, LedgerError>;

    /// IDs of all active candidates.
    async fn active_candidate_ids(&self) -> Result<Vec<ChainCandidateId>, LedgerError>;

    /// Has the given address used its vote?
    async fn has_address_voted(&self, address: &str) -> Result<bool, LedgerError>;

    /// Current status of a submitted transaction.
    async fn transaction_status(&self, tx: &TxHash) -> Result<TxStatus, LedgerError>;
}

/// Poll a transaction until it confirms, fails, or the deadline passes.
///
/// Returns `Ok(TxStatus::Pending)` on timeout: a timed-out wait is not a
/// failure, and the caller should re-query later rather than resubmit.
pub async fn await_confirmation<C: BallotContract + ?Sized>(
    contract: &C,
    tx: &TxHash,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TxStatus, LedgerError> {
    let deadline = Instant::now() + timeout;
    loop {
        match contract.transaction_status(tx).await? {
            TxStatus::Pending => {
                if Instant::now() >= deadline {
                    debug!("Transaction {tx} still pending at deadline");
                    return Ok(TxStatus::Pending);
                }
                sleep(poll_interval).await;
            }
            done => return Ok(done),
        }
    }
}

/// The outcome of syncing one configured candidate onto the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// A candidate with this name is already active on-chain.
    AlreadyPresent,
    /// Submitted an `addCandidate` transaction.
    Submitted(TxHash),
}

/// Push the locally configured candidates onto the ledger, skipping any
/// whose name is already active there. Returns one action per entry, in
/// file order.
pub async fn sync_candidates<C: BallotContract + ?Sized>(
    contract: &C,
    file: &CandidatesFile,
) -> Result<Vec<(String, SyncAction)>, LedgerError> {
    let active_ids = contract.active_candidate_ids().await?;
    let mut active_names = Vec::with_capacity(active_ids.len());
    for id in active_ids {
        active_names.push(contract.candidate(id).await?.name);
    }

    let mut actions = Vec::with_capacity(file.candidates.len());
    for entry in &file.candidates {
        let action = if active_names.iter().any(|name| name == &entry.name) {
            debug!("Candidate \"{}\" already on the ledger", entry.name);
            SyncAction::AlreadyPresent
        } else {
            info!("Submitting candidate \"{}\" ({})", entry.name, entry.party);
            let tx = contract
                .add_candidate(&entry.name, &entry.party, &entry.image_hash)
                .await?;
            active_names.push(entry.name.clone());
            SyncAction::Submitted(tx)
        };
        actions.push((entry.name.clone(), action));
    }
    Ok(actions)
}
