use rocket::{serde::json::Json, Route};

use crate::ballot::{compute_results, BallotStore, Coordinator, MongoBallotStore};
use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        response::{ApiResponse, EmptyData, ResultsResponse},
        vote::{CastVoteRequest, VoterStatus},
    },
    db::{Admin, Voter},
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, results, my_vote]
}

/// Cast the authenticated voter's single vote.
#[post("/votes", data = "<request>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    request: Json<CastVoteRequest>,
    coordinator: Coordinator<MongoBallotStore>,
) -> Result<Json<ApiResponse<EmptyData>>> {
    coordinator
        .cast_vote(token.id, *request.candidate_id)
        .await?;
    Ok(Json(ApiResponse::ok(EmptyData {})))
}

/// Ranked, percentage-annotated tallies. Admin only.
#[get("/votes/results")]
async fn results(
    _token: AuthToken<Admin>,
    coordinator: Coordinator<MongoBallotStore>,
) -> Result<Json<ResultsResponse>> {
    let candidates = coordinator.store().candidates().await?;
    Ok(Json(compute_results(candidates).into()))
}

/// The authenticated voter's own vote status.
#[get("/votes/my-vote")]
async fn my_vote(
    token: AuthToken<Voter>,
    coordinator: Coordinator<MongoBallotStore>,
) -> Result<Json<ApiResponse<VoterStatus>>> {
    let status = coordinator.voter_status(token.id).await?;
    Ok(Json(ApiResponse::ok(status)))
}
