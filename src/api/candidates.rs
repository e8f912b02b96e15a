use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        candidate::{CandidateDescription, CandidateSpec},
        response::{ApiResponse, EmptyData},
    },
    db::{Admin, Candidate, NewCandidate, Voter},
    mongodb::{Coll, Id},
};

use super::common::candidate_by_id;

pub fn routes() -> Vec<Route> {
    routes![
        candidates_admin,
        candidates_voter,
        candidate_admin,
        candidate_voter,
        create_candidate,
        update_candidate,
        delete_candidate,
    ]
}

#[get("/candidates", rank = 1)]
async fn candidates_admin(
    _token: AuthToken<Admin>,
    candidates: Coll<Candidate>,
) -> Result<Json<ApiResponse<Vec<CandidateDescription>>>> {
    all_candidates(candidates).await
}

#[get("/candidates", rank = 2)]
async fn candidates_voter(
    _token: AuthToken<Voter>,
    candidates: Coll<Candidate>,
) -> Result<Json<ApiResponse<Vec<CandidateDescription>>>> {
    all_candidates(candidates).await
}

async fn all_candidates(
    candidates: Coll<Candidate>,
) -> Result<Json<ApiResponse<Vec<CandidateDescription>>>> {
    let all: Vec<Candidate> = candidates.find(doc! {}, None).await?.try_collect().await?;
    let descriptions = all.into_iter().map(CandidateDescription::from).collect();
    Ok(Json(ApiResponse::ok(descriptions)))
}

#[get("/candidates/<candidate_id>", rank = 1)]
async fn candidate_admin(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    candidates: Coll<Candidate>,
) -> Result<Json<ApiResponse<CandidateDescription>>> {
    let candidate = candidate_by_id(candidate_id, &candidates).await?;
    Ok(Json(ApiResponse::ok(candidate.into())))
}

#[get("/candidates/<candidate_id>", rank = 2)]
async fn candidate_voter(
    _token: AuthToken<Voter>,
    candidate_id: Id,
    candidates: Coll<Candidate>,
) -> Result<Json<ApiResponse<CandidateDescription>>> {
    let candidate = candidate_by_id(candidate_id, &candidates).await?;
    Ok(Json(ApiResponse::ok(candidate.into())))
}

#[post("/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    new_candidates: Coll<NewCandidate>,
) -> Result<Json<ApiResponse<CandidateDescription>>> {
    spec.validate()?;
    let candidate: NewCandidate = spec.0.into();
    let id: Id = new_candidates
        .insert_one(&candidate, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();
    Ok(Json(ApiResponse::ok(Candidate { id, candidate }.into())))
}

/// Edit a candidate's descriptive metadata.
///
/// The update is scoped to fields disjoint from `votes`/`total_votes`, so it
/// can never race a concurrent vote append.
#[put("/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn update_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    candidates: Coll<Candidate>,
) -> Result<Json<ApiResponse<CandidateDescription>>> {
    spec.validate()?;
    let update = doc! {
        "$set": {
            "name": &spec.name,
            "party": &spec.party,
            "photo": &spec.photo,
            "symbol": &spec.symbol,
        }
    };
    let result = candidates
        .update_one(candidate_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!(
            "Candidate with ID '{candidate_id}'"
        )));
    }
    let candidate = candidate_by_id(candidate_id, &candidates).await?;
    Ok(Json(ApiResponse::ok(candidate.into())))
}

/// Delete a candidate.
///
/// Only candidates without recorded votes may be deleted; anything else
/// would orphan entries in voters' committed statuses.
#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    candidates: Coll<Candidate>,
) -> Result<Json<ApiResponse<EmptyData>>> {
    let result = candidates
        .delete_one(doc! { "_id": *candidate_id, "total_votes": 0 }, None)
        .await?;
    if result.deleted_count == 0 {
        // Distinguish a missing candidate from one with votes.
        return Err(match candidates.find_one(candidate_id.as_doc(), None).await? {
            Some(_) => Error::bad_request("Cannot delete a candidate with recorded votes"),
            None => Error::not_found(format!("Candidate with ID '{candidate_id}'")),
        });
    }
    Ok(Json(ApiResponse::ok(EmptyData {})))
}
