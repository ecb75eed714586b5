use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    election::Election,
    user::{NewUser, User},
    vote::{NewVoteRecord, VoteRecord},
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `derive(Clone)` would demand `T: Clone`, which we don't need.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collection.
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewUser {
    const NAME: &'static str = USERS;
}

// Election collection; candidates are embedded in their election.
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}

// Vote record collection.
const VOTES: &str = "votes";
impl MongoCollection for VoteRecord {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVoteRecord {
    const NAME: &'static str = VOTES;
}

// Counter collection.
const COUNTERS: &str = "counters";
impl MongoCollection for Counter {
    const NAME: &'static str = COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent. The unique index over
/// `(user_id, election_id)` is what makes the one-vote rule hold under
/// concurrent casts from any number of server processes.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection: usernames are unique (exact, case-sensitive).
    let user_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db).create_index(user_index, None).await?;

    // Vote collection: at most one vote record per user per election.
    let vote_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "election_id": 1})
        .options(unique)
        .build();
    Coll::<VoteRecord>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    Ok(())
}
