use mongodb::Client;
use rocket::{form::Form, response::Redirect, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            vote::{VoteForm, VoteRequest, VoteResponse},
        },
        db::{
            election::{Election, ElectionId},
            vote::{cast_vote, has_voted, NewVoteRecord, VoteRecord},
        },
        mongodb::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![voted, vote_form, vote_api]
}

#[get("/elections/<election_id>/voted")]
pub async fn voted(
    token: AuthToken,
    election_id: ElectionId,
    votes: Coll<VoteRecord>,
) -> Result<Json<bool>> {
    Ok(Json(has_voted(&votes, token.id, election_id).await?))
}

/// Browser-facing vote endpoint: casts and redirects.
///
/// Success lands on the results page; business-rule failures bounce back
/// to the election page with the failure kind in the query string, so the
/// page can show a notice. Everything else reports as a plain error.
#[post("/elections/<election_id>/vote", data = "<ballot>")]
pub async fn vote_form(
    token: AuthToken,
    election_id: ElectionId,
    ballot: Form<VoteForm>,
    client: &State<Client>,
    elections: Coll<Election>,
    votes: Coll<NewVoteRecord>,
) -> Result<Redirect> {
    let outcome = cast_vote(
        client,
        &elections,
        &votes,
        token.id,
        election_id,
        ballot.candidate,
    )
    .await;

    match outcome {
        Ok(()) => Ok(Redirect::to(format!("/elections/{election_id}/results"))),
        Err(err @ (Error::AlreadyVoted | Error::InvalidCandidate)) => Ok(Redirect::to(format!(
            "/elections/{election_id}?error={}",
            err.kind()
        ))),
        Err(err) => Err(err),
    }
}

/// JSON vote endpoint: same ledger, `{status, message|redirect}` in and
/// out, with the status taxonomy carried by the HTTP code.
#[post("/api/elections/<election_id>/vote", data = "<ballot>", format = "json")]
pub async fn vote_api(
    token: AuthToken,
    election_id: ElectionId,
    ballot: Json<VoteRequest>,
    client: &State<Client>,
    elections: Coll<Election>,
    votes: Coll<NewVoteRecord>,
) -> Result<Json<VoteResponse>> {
    cast_vote(
        client,
        &elections,
        &votes,
        token.id,
        election_id,
        ballot.candidate_id,
    )
    .await?;
    Ok(Json(VoteResponse::ok(format!(
        "/elections/{election_id}/results"
    ))))
}
