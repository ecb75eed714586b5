use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AdminToken, AuthToken},
            election::{
                ElectionDescription, ElectionResults, ElectionSpec, ElectionSummary, ElectionView,
            },
        },
        db::{
            election::{Election, ElectionCore, ElectionId},
            vote::{has_voted, VoteRecord},
        },
        mongodb::{Coll, Counter, ELECTION_ID_COUNTER_ID},
    },
};

pub fn routes() -> Vec<Route> {
    routes![create_election, list_elections, get_election, get_results]
}

#[post("/elections", data = "<spec>", format = "json")]
pub async fn create_election(
    _token: AdminToken,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    counters: Coll<Counter>,
) -> Result<Json<ElectionDescription>> {
    let core: ElectionCore = spec.0.try_into()?;

    // The document embeds its candidates, so a single insert either
    // persists the whole election or none of it.
    let election = Election {
        id: Counter::next(&counters, ELECTION_ID_COUNTER_ID).await?,
        election: core,
    };
    elections.insert_one(&election, None).await?;
    info!("Election {} created: {}", election.id, election.title);

    Ok(Json(election.into()))
}

#[get("/elections")]
pub async fn list_elections(elections: Coll<Election>) -> Result<Json<Vec<ElectionSummary>>> {
    // Most recently created first.
    let options = FindOptions::builder().sort(doc! {"_id": -1}).build();
    let all: Vec<Election> = elections.find(None, options).await?.try_collect().await?;
    Ok(Json(all.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
pub async fn get_election(
    token: AuthToken,
    election_id: ElectionId,
    elections: Coll<Election>,
    votes: Coll<VoteRecord>,
) -> Result<Json<ElectionView>> {
    let election = elections
        .find_one(doc! {"_id": election_id}, None)
        .await?
        .ok_or(Error::ElectionNotFound(election_id))?;
    let voted = has_voted(&votes, token.id, election_id).await?;
    Ok(Json(ElectionView {
        election: election.into(),
        voted,
    }))
}

#[get("/elections/<election_id>/results")]
pub async fn get_results(
    _token: AuthToken,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<Json<ElectionResults>> {
    let election = elections
        .find_one(doc! {"_id": election_id}, None)
        .await?
        .ok_or(Error::ElectionNotFound(election_id))?;
    Ok(Json(election.into()))
}
