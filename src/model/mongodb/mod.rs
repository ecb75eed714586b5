mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_election_id_counter_exists, Counter, DEMO_SEED_MARKER_ID, ELECTION_ID_COUNTER_ID,
};
pub use errors::{is_duplicate_key_error, is_write_conflict_error};
