use std::ops::Deref;

use mongodb::{bson::doc, Client};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::election::{CandidateId, Election, ElectionId};
use crate::model::mongodb::{is_duplicate_key_error, is_write_conflict_error, Coll, Id};

/// Core vote record data: proof that a user has voted in an election.
///
/// Which candidate received the vote is deliberately not recorded here;
/// the record exists purely so the unique `(user_id, election_id)` index
/// can reject a second vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecordCore {
    pub user_id: Id,
    pub election_id: ElectionId,
}

/// A vote record without an ID.
pub type NewVoteRecord = VoteRecordCore;

/// A vote record from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteRecordCore,
}

impl Deref for VoteRecord {
    type Target = VoteRecordCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// Has the given user already voted in the given election?
pub async fn has_voted(
    votes: &Coll<VoteRecord>,
    user_id: Id,
    election_id: ElectionId,
) -> Result<bool> {
    let filter = doc! {
        "user_id": *user_id,
        "election_id": election_id,
    };
    Ok(votes.find_one(filter, None).await?.is_some())
}

/// Cast a vote: record that the user has voted in the election and bump
/// the chosen candidate's tally, atomically.
///
/// The two writes share one transaction, so a crash can never leave an
/// incremented tally without its record or vice versa. The one-vote rule
/// is enforced by the unique `(user_id, election_id)` index rather than
/// any check-then-act: of two concurrent casts by the same user, exactly
/// one insert satisfies the index and the other aborts with
/// [`Error::AlreadyVoted`], rolling its increment back with it.
pub async fn cast_vote(
    client: &Client,
    elections: &Coll<Election>,
    votes: &Coll<NewVoteRecord>,
    user_id: Id,
    election_id: ElectionId,
    candidate_id: CandidateId,
) -> Result<()> {
    // Resolve the election; inactive elections do not accept votes.
    let filter = doc! {
        "_id": election_id,
        "active": true,
    };
    let election = elections
        .find_one(filter, None)
        .await?
        .ok_or(Error::ElectionNotFound(election_id))?;

    // The candidate must belong to *this* election. IDs from another
    // election are meaningless here even if they happen to exist there.
    if election.candidate(candidate_id).is_none() {
        return Err(Error::InvalidCandidate);
    }

    // Friendly early answer for the sequential case. Not load-bearing:
    // the unique index below is the authority under races.
    let voted_filter = doc! {
        "user_id": *user_id,
        "election_id": election_id,
    };
    if votes.find_one(voted_filter, None).await?.is_some() {
        return Err(Error::AlreadyVoted);
    }

    let mut session = client.start_session(None).await?;
    session.start_transaction(None).await?;

    let record = NewVoteRecord {
        user_id,
        election_id,
    };
    match votes.insert_one_with_session(&record, None, &mut session).await {
        Ok(_) => {}
        // A concurrent cast holding the same (user, election) key shows
        // up as a write conflict before it commits and as a duplicate
        // key after; either way, this attempt is the loser.
        Err(ref err) if is_duplicate_key_error(err) || is_write_conflict_error(err) => {
            session.abort_transaction().await?;
            return Err(Error::AlreadyVoted);
        }
        Err(err) => {
            session.abort_transaction().await?;
            return Err(err.into());
        }
    }

    let candidate_filter = doc! {
        "_id": election_id,
        "candidates.id": candidate_id,
    };
    let increment = doc! {
        "$inc": { "candidates.$.votes": 1 }
    };
    let result = match elections
        .update_one_with_session(candidate_filter, increment, None, &mut session)
        .await
    {
        Ok(result) => result,
        Err(err) => {
            session.abort_transaction().await?;
            return Err(err.into());
        }
    };
    if result.modified_count != 1 {
        // Candidate list changed under us; undo the record.
        session.abort_transaction().await?;
        return Err(Error::InvalidCandidate);
    }

    session.commit_transaction().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;
    use rocket::local::asynchronous::Client as RocketClient;

    use crate::model::db::election::ElectionCore;
    use crate::model::db::user::UserCore;

    async fn setup(db: &Database) -> (Id, Election) {
        let users = Coll::<UserCore>::from_db(db);
        let user_id: Id = users
            .insert_one(UserCore::example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let election = Election {
            id: 42,
            election: ElectionCore::example(),
        };
        Coll::<Election>::from_db(db)
            .insert_one(&election, None)
            .await
            .unwrap();

        (user_id, election)
    }

    fn db_client(client: &RocketClient) -> Client {
        client.rocket().state::<Client>().unwrap().clone()
    }

    async fn tally_sum(db: &Database, election_id: ElectionId) -> u64 {
        Coll::<Election>::from_db(db)
            .find_one(doc! {"_id": election_id}, None)
            .await
            .unwrap()
            .unwrap()
            .candidates
            .iter()
            .map(|c| c.votes)
            .sum()
    }

    #[db_test]
    async fn first_vote_counts_second_is_rejected(client: RocketClient, db: Database) {
        let (user_id, election) = setup(&db).await;
        let mongo = db_client(&client);
        let elections = Coll::<Election>::from_db(&db);
        let votes = Coll::<NewVoteRecord>::from_db(&db);

        cast_vote(&mongo, &elections, &votes, user_id, election.id, 1)
            .await
            .unwrap();
        assert_eq!(tally_sum(&db, election.id).await, 1);
        let records = Coll::<VoteRecord>::from_db(&db);
        assert!(has_voted(&records, user_id, election.id).await.unwrap());

        // A second attempt fails even for a different candidate, and the
        // tallies stay put.
        let err = cast_vote(&mongo, &elections, &votes, user_id, election.id, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted));
        assert_eq!(tally_sum(&db, election.id).await, 1);
    }

    #[db_test]
    async fn concurrent_votes_count_exactly_once(client: RocketClient, db: Database) {
        let (user_id, election) = setup(&db).await;
        let mongo = db_client(&client);
        let elections = Coll::<Election>::from_db(&db);
        let votes = Coll::<NewVoteRecord>::from_db(&db);

        let (a, b, c) = rocket::tokio::join!(
            cast_vote(&mongo, &elections, &votes, user_id, election.id, 1),
            cast_vote(&mongo, &elections, &votes, user_id, election.id, 2),
            cast_vote(&mongo, &elections, &votes, user_id, election.id, 1),
        );
        let successes = [&a, &b, &c].iter().filter(|r| r.is_ok()).count();
        let already = [&a, &b, &c]
            .iter()
            .filter(|r| matches!(r, Err(Error::AlreadyVoted)))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(already, 2);
        assert_eq!(tally_sum(&db, election.id).await, 1);
    }

    #[db_test]
    async fn candidate_from_another_election_is_rejected(client: RocketClient, db: Database) {
        let (user_id, election) = setup(&db).await;
        let mongo = db_client(&client);
        let elections = Coll::<Election>::from_db(&db);
        let votes = Coll::<NewVoteRecord>::from_db(&db);

        // A second election with a candidate ID the first doesn't have.
        let other = Election {
            id: 43,
            election: ElectionCore::new(
                "Other".to_string(),
                None,
                vec!["P".into(), "Q".into(), "R".into()],
            ),
        };
        elections.insert_one(&other, None).await.unwrap();

        let err = cast_vote(&mongo, &elections, &votes, user_id, election.id, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCandidate));
        assert_eq!(tally_sum(&db, election.id).await, 0);
        let records = Coll::<VoteRecord>::from_db(&db);
        assert!(!has_voted(&records, user_id, election.id).await.unwrap());
    }

    #[db_test]
    async fn unknown_election_is_not_found(client: RocketClient, db: Database) {
        let (user_id, _) = setup(&db).await;
        let mongo = db_client(&client);
        let elections = Coll::<Election>::from_db(&db);
        let votes = Coll::<NewVoteRecord>::from_db(&db);

        let err = cast_vote(&mongo, &elections, &votes, user_id, 999, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionNotFound(999)));
    }
}
