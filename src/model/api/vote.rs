use rocket::form::FromForm;
use serde::{Deserialize, Serialize};

use crate::model::db::election::CandidateId;

/// The form body of the browser-facing vote endpoint.
#[derive(Debug, FromForm)]
pub struct VoteForm {
    pub candidate: CandidateId,
}

/// The JSON body of the API vote endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct VoteRequest {
    pub candidate_id: CandidateId,
}

/// JSON response of the API vote endpoint: `{status, message|redirect}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl VoteResponse {
    /// A successful cast, pointing the client at the results page.
    pub fn ok(redirect: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: None,
            redirect: Some(redirect.into()),
        }
    }
}
