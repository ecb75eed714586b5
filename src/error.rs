use std::io::Cursor;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::{ContentType, Status},
    response::{self, Responder, Response},
    serde::json::json,
    Request,
};
use thiserror::Error;

use crate::model::db::election::ElectionId;

pub type Result<T> = std::result::Result<T, Error>;

/// Every expected, user-facing failure the API can report, plus the
/// wrapped library errors that surface as a generic internal failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Username and password are required")]
    MissingField,
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    #[error("Username already exists")]
    DuplicateUsername,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Please log in to continue")]
    AuthenticationRequired,
    #[error("Admin access required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("Invalid candidate selected")]
    InvalidCandidate,
    #[error("Election {0} not found")]
    ElectionNotFound(ElectionId),
}

impl Error {
    /// The HTTP status this error reports as.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
            Self::MissingField
            | Self::WeakPassword
            | Self::DuplicateUsername
            | Self::InvalidInput(_)
            | Self::AlreadyVoted
            | Self::InvalidCandidate => Status::BadRequest,
            Self::InvalidCredentials | Self::AuthenticationRequired => Status::Unauthorized,
            Self::Forbidden => Status::Forbidden,
            Self::NotFound(_) | Self::ElectionNotFound(_) => Status::NotFound,
        }
    }

    /// A stable short name, used as the `error` query parameter when the
    /// form endpoints redirect back to the page the user came from.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => "internal",
            Self::MissingField => "missing_field",
            Self::WeakPassword => "weak_password",
            Self::DuplicateUsername => "duplicate_username",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AuthenticationRequired => "authentication_required",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::AlreadyVoted => "already_voted",
            Self::InvalidCandidate => "invalid_candidate",
            Self::ElectionNotFound(_) => "election_not_found",
        }
    }

    /// The message shown to the end user. Internal failures are collapsed
    /// to a generic message so no library detail leaks out.
    fn public_message(&self) -> String {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    /// Report the error as a structured JSON failure.
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("Internal error handling {}: {}", req.uri(), self);
        }
        let body = json!({
            "status": "error",
            "message": self.public_message(),
        })
        .to_string();
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
