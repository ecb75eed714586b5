use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::election::{Candidate, CandidateId, Election, ElectionCore, ElectionId};

/// An election that an administrator wishes to create.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Candidate names in ballot order.
    pub candidates: Vec<String>,
}

impl TryFrom<ElectionSpec> for ElectionCore {
    type Error = Error;

    /// Validate and normalise the spec: the title and every candidate
    /// name are trimmed, empty candidate entries are dropped (duplicates
    /// are deliberately kept), and there must remain a title and at
    /// least one candidate.
    fn try_from(spec: ElectionSpec) -> Result<Self> {
        let title = spec.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }

        let candidates: Vec<String> = spec
            .candidates
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if candidates.is_empty() {
            return Err(Error::InvalidInput(
                "at least one candidate is required".to_string(),
            ));
        }

        let description = spec
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(ElectionCore::new(title, description, candidates))
    }
}

/// A candidate as returned by the API.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub name: String,
    pub votes: u64,
}

impl From<&Candidate> for CandidateDescription {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name.clone(),
            votes: candidate.votes,
        }
    }
}

/// A full election as returned by the API, candidates included.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub title: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub candidates: Vec<CandidateDescription>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            candidates: election.candidates.iter().map(Into::into).collect(),
            title: election.election.title,
            description: election.election.description,
            active: election.election.active,
            created_at: election.election.created_at,
        }
    }
}

/// The single-election view: the election plus whether the requesting
/// user has already voted in it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionView {
    #[serde(flatten)]
    pub election: ElectionDescription,
    pub voted: bool,
}

/// A list-item view of an election, without its candidates.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ElectionId,
    pub title: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.election.title,
            description: election.election.description,
            active: election.election.active,
            created_at: election.election.created_at,
        }
    }
}

/// One row of the results table.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateStanding {
    pub name: String,
    pub votes: u64,
}

/// Ranked election results: descending tally, ties in ballot order.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionResults {
    pub id: ElectionId,
    pub title: String,
    pub standings: Vec<CandidateStanding>,
}

impl From<Election> for ElectionResults {
    fn from(election: Election) -> Self {
        let standings = election
            .ranked_candidates()
            .into_iter()
            .map(|candidate| CandidateStanding {
                name: candidate.name.clone(),
                votes: candidate.votes,
            })
            .collect();
        Self {
            id: election.id,
            title: election.election.title,
            standings,
        }
    }
}


/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionSpec {
        pub fn example() -> Self {
            Self {
                title: "Club President 2026".to_string(),
                description: Some("Annual committee election".to_string()),
                candidates: vec!["Ada".to_string(), "Grace".to_string()],
            }
        }
    }
}
