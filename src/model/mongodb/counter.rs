use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::election::ElectionId;
use crate::model::mongodb::{is_duplicate_key_error, Coll};

/// Counter ID for the global election ID sequence.
pub const ELECTION_ID_COUNTER_ID: &str = "election_id";

/// Counter ID whose insert-if-absent gates demo election seeding.
pub const DEMO_SEED_MARKER_ID: &str = "demo_election";

/// A counter object used to implement auto-increment fields.
///
/// Counters live under well-known string IDs, which also makes them usable
/// as insert-once markers: whichever process first inserts a given ID wins,
/// and everyone else sees a duplicate key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: ElectionId,
}

impl Counter {
    /// Create a new `Counter` starting at the given value.
    pub fn new(id: impl Into<String>, start: ElectionId) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<ElectionId> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! {"_id": id}, update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("Counter {} does not exist", id)))?;
        Ok(counter.next)
    }
}

/// Ensure the global election ID counter exists, starting at 1.
///
/// Idempotent and safe to race: the fixed `_id` means at most one insert
/// ever succeeds.
pub async fn ensure_election_id_counter_exists(counters: &Coll<Counter>) -> Result<()> {
    let existing = counters
        .find_one(doc! {"_id": ELECTION_ID_COUNTER_ID}, None)
        .await?;
    if existing.is_none() {
        let result = counters
            .insert_one(Counter::new(ELECTION_ID_COUNTER_ID, 1), None)
            .await;
        match result {
            Ok(_) => info!("Created election ID counter"),
            // Another process beat us to it.
            Err(ref err) if is_duplicate_key_error(err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;
    use rocket::local::asynchronous::Client;

    #[db_test]
    async fn counter_increment(_client: Client, db: Database) {
        let counters = Coll::<Counter>::from_db(&db);
        counters
            .insert_one(Counter::new("test_counter", 5), None)
            .await
            .unwrap();

        // Get the next value.
        let next = Counter::next(&counters, "test_counter").await.unwrap();
        assert_eq!(next, 5);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! {"_id": "test_counter"}, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, 6);
    }

    #[db_test]
    async fn counter_seeding_races_resolve(_client: Client, db: Database) {
        let counters = Coll::<Counter>::from_db(&db);

        // The launch fairing has already created the counter; re-running the
        // seed step must not reset it.
        Counter::next(&counters, ELECTION_ID_COUNTER_ID).await.unwrap();
        ensure_election_id_counter_exists(&counters).await.unwrap();
        let counter = counters
            .find_one(doc! {"_id": ELECTION_ID_COUNTER_ID}, None)
            .await
            .unwrap()
            .unwrap();
        assert!(counter.next > 1);
    }
}
