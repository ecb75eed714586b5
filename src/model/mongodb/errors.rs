//! The mongodb crate doesn't provide error code constants, so the ones we
//! care about live here.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;
pub const WRITE_CONFLICT: i32 = 112;

/// Return true if the given error is a duplicate key write error, i.e. a
/// unique index rejected the write.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    error_code(err) == Some(DUPLICATE_KEY)
}

/// Return true if the given error is a transactional write conflict: a
/// concurrent uncommitted transaction holds a write this one needs.
pub fn is_write_conflict_error(err: &DbError) -> bool {
    error_code(err) == Some(WRITE_CONFLICT)
}

fn error_code(err: &DbError) -> Option<i32> {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => Some(e.code),
        ErrorKind::Command(ref e) => Some(e.code),
        _ => None,
    }
}
