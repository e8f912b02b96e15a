use crate::error::{Error, Result};
use crate::model::{
    db::Candidate,
    mongodb::{Coll, Id},
};

/// Look up a candidate by ID, or fail with a 404.
pub async fn candidate_by_id(candidate_id: Id, candidates: &Coll<Candidate>) -> Result<Candidate> {
    candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate with ID '{candidate_id}'")))
}
