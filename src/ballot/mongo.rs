use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, to_bson},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    Client, ClientSession, Database,
};
use rocket::{
    futures::TryStreamExt,
    request::{self, FromRequest, Request},
    State,
};

use crate::error::{Error, Result};
use crate::model::{
    db::{candidate::VoteRecord, Candidate, Voter},
    mongodb::{Coll, Id},
};

use super::{BallotStore, Coordinator, VoteError};

/// The production [`BallotStore`], backed by MongoDB.
///
/// The vote transition runs inside a multi-document transaction with the
/// unvoted precondition folded into the update filter, so the check and the
/// mutation commit as one unit. Transient transaction errors surface as
/// [`VoteError::StorageConflict`] for the coordinator to retry.
pub struct MongoBallotStore {
    client: Client,
    db: Database,
}

impl MongoBallotStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    async fn record_vote_in_session(
        &self,
        session: &mut ClientSession,
        voter_id: Id,
        candidate_id: Id,
        cast_at: DateTime<Utc>,
    ) -> Result<()> {
        let voters = Coll::<Voter>::from_db(&self.db);
        let candidates = Coll::<Candidate>::from_db(&self.db);

        // Mutate-if-unvoted: the guard filter makes the precondition check
        // and the voter transition a single conditional write.
        let voter_update = voters
            .update_one_with_session(
                doc! { "_id": *voter_id, "has_voted": false },
                doc! { "$set": {
                    "has_voted": true,
                    "voted_for": *candidate_id,
                    "voted_at": to_bson(&cast_at)?,
                }},
                None,
                session,
            )
            .await?;
        if voter_update.matched_count == 0 {
            // Distinguish a missing voter from one who has already voted.
            let voter = voters
                .find_one_with_session(voter_id.as_doc(), None, session)
                .await?;
            return Err(match voter {
                Some(_) => VoteError::AlreadyVoted.into(),
                None => VoteError::VoterNotFound(voter_id).into(),
            });
        }

        // Append the vote and bump the total in one document update, keeping
        // `total_votes == votes.len()` inside the committed state.
        let record = to_bson(&VoteRecord {
            voter_id,
            voted_at: cast_at,
        })?;
        let candidate_update = candidates
            .update_one_with_session(
                candidate_id.as_doc(),
                doc! {
                    "$push": { "votes": record },
                    "$inc": { "total_votes": 1 },
                },
                None,
                session,
            )
            .await?;
        if candidate_update.matched_count == 0 {
            return Err(VoteError::CandidateNotFound(candidate_id).into());
        }

        Ok(())
    }
}

/// Map transient transaction failures onto the retryable conflict error.
///
/// Only `TransientTransactionError` means the transaction definitely did not
/// commit and is safe to re-run from the top. An unknown commit result must
/// never surface as a conflict: re-running a transaction that may already
/// have committed would report `AlreadyVoted` for the voter's own vote.
fn classify_db_error(err: DbError) -> Error {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        VoteError::StorageConflict.into()
    } else {
        err.into()
    }
}

/// Commit the transaction, retrying the commit itself while the driver
/// reports the result as unknown.
async fn commit_with_retry(session: &mut ClientSession) -> Result<()> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                warn!("Transaction commit result unknown, retrying the commit");
            }
            Err(err) => return Err(classify_db_error(err)),
        }
    }
}

#[rocket::async_trait]
impl BallotStore for MongoBallotStore {
    async fn voter(&self, voter_id: Id) -> Result<Option<Voter>> {
        Ok(Coll::<Voter>::from_db(&self.db)
            .find_one(voter_id.as_doc(), None)
            .await?)
    }

    async fn candidate(&self, candidate_id: Id) -> Result<Option<Candidate>> {
        Ok(Coll::<Candidate>::from_db(&self.db)
            .find_one(candidate_id.as_doc(), None)
            .await?)
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        Ok(Coll::<Candidate>::from_db(&self.db)
            .find(doc! {}, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn record_vote(
        &self,
        voter_id: Id,
        candidate_id: Id,
        cast_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        match self
            .record_vote_in_session(&mut session, voter_id, candidate_id, cast_at)
            .await
        {
            Ok(()) => commit_with_retry(&mut session).await,
            Err(err) => {
                // Nothing inside the transaction is visible to any reader.
                let _ = session.abort_transaction().await;
                Err(match err {
                    Error::Db(db_err) => classify_db_error(db_err),
                    other => other,
                })
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Coordinator<MongoBallotStore> {
    type Error = ();

    /// Build a coordinator over the managed database connection.
    ///
    /// Panics iff the [`Client`] or [`Database`] is not managed by
    /// [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coordinator::new(MongoBallotStore::new(
            client.inner().clone(),
            db.inner().clone(),
        )))
    }
}
