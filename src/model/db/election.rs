use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::{Client, Database};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{
    is_duplicate_key_error, Coll, Counter, DEMO_SEED_MARKER_ID, ELECTION_ID_COUNTER_ID,
};

/// Election IDs are small sequential integers, allocated from the global
/// counter, so they can appear in human-friendly URLs.
pub type ElectionId = u32;

/// Candidate IDs are per-election integers reflecting creation order.
pub type CandidateId = u32;

/// A candidate standing in an election, with its running tally.
///
/// Candidates are embedded in their election document; they have no life of
/// their own, and deleting an election takes them with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// 1-based position in creation order, unique within the election.
    pub id: CandidateId,
    /// Candidate name. Duplicate names within an election are allowed.
    pub name: String,
    /// Vote tally, only ever touched by the vote ledger's `$inc`.
    pub votes: u64,
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: Option<String>,
    pub active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Candidates in creation order.
    pub candidates: Vec<Candidate>,
}

impl ElectionCore {
    /// Create a new election from already-validated parts, numbering the
    /// candidates in the order given.
    pub fn new(title: String, description: Option<String>, candidate_names: Vec<String>) -> Self {
        let candidates = candidate_names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Candidate {
                id: index as CandidateId + 1,
                name,
                votes: 0,
            })
            .collect();
        Self {
            title,
            description,
            active: true,
            created_at: Utc::now(),
            candidates,
        }
    }

    /// Look up a candidate of this election by ID.
    pub fn candidate(&self, candidate_id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Candidates ranked for display: descending tally, ties broken by
    /// creation order. Deterministic for identical underlying data.
    pub fn ranked_candidates(&self) -> Vec<&Candidate> {
        let mut ranked: Vec<&Candidate> = self.candidates.iter().collect();
        // Stable sort; `candidates` is already in creation order.
        ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
        ranked
    }
}

/// An election from the database, with its unique ID.
///
/// Unlike users and vote records, elections carry their ID at insert time,
/// since it comes from the counter rather than the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Ensure one demonstration election exists if none has ever been seeded.
///
/// The insert of the fixed-ID seed marker and the insert of the demo
/// election happen in one transaction: concurrent first-boots race on the
/// marker's `_id`, the losers abort cleanly, and any failure rolls the
/// whole demo back. There is never a partially seeded election.
pub async fn ensure_demo_election_exists(client: &Client, db: &Database) -> Result<()> {
    let elections = Coll::<Election>::from_db(db);
    let counters = Coll::<Counter>::from_db(db);

    // Cheap early-out; the marker below is the authority under races.
    if elections.count_documents(None, None).await? > 0 {
        return Ok(());
    }

    let demo = Election {
        id: Counter::next(&counters, ELECTION_ID_COUNTER_ID).await?,
        election: ElectionCore::new(
            "Demo Election".to_string(),
            Some("This is a demo election to show the UI.".to_string()),
            vec!["Alice".to_string(), "Bob".to_string()],
        ),
    };

    let mut session = client.start_session(None).await?;
    session.start_transaction(None).await?;

    let marker = Counter::new(DEMO_SEED_MARKER_ID, 0);
    match counters
        .insert_one_with_session(marker, None, &mut session)
        .await
    {
        Ok(_) => {}
        // Another process already seeded the demo data.
        Err(ref err) if is_duplicate_key_error(err) => {
            session.abort_transaction().await?;
            return Ok(());
        }
        Err(err) => {
            session.abort_transaction().await?;
            return Err(err.into());
        }
    }

    if let Err(err) = elections
        .insert_one_with_session(&demo, None, &mut session)
        .await
    {
        session.abort_transaction().await?;
        return Err(err.into());
    }

    session.commit_transaction().await?;
    info!("Seeded demo election {}", demo.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_are_numbered_in_creation_order() {
        let election = ElectionCore::new(
            "Best editor".to_string(),
            None,
            vec!["ed".to_string(), "vim".to_string(), "emacs".to_string()],
        );
        let ids: Vec<CandidateId> = election.candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(election.candidates.iter().all(|c| c.votes == 0));
        assert!(election.active);
    }

    #[test]
    fn candidate_lookup_is_by_id_not_position() {
        let election = ElectionCore::new(
            "Test".to_string(),
            None,
            vec!["A".to_string(), "B".to_string()],
        );
        assert_eq!(election.candidate(2).unwrap().name, "B");
        assert!(election.candidate(3).is_none());
        assert!(election.candidate(0).is_none());
    }

    #[test]
    fn ranking_is_descending_with_creation_order_ties() {
        let mut election = ElectionCore::new(
            "Test".to_string(),
            None,
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
        );
        election.candidates[0].votes = 5;
        election.candidates[1].votes = 5;
        election.candidates[2].votes = 7;

        let ranked: Vec<&str> = election
            .ranked_candidates()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(ranked, vec!["C", "A", "B"]);
    }

    #[test]
    fn ranking_is_reproducible() {
        let mut election = ElectionCore::new(
            "Test".to_string(),
            None,
            vec!["X".to_string(), "Y".to_string()],
        );
        election.candidates[0].votes = 2;
        election.candidates[1].votes = 2;
        let first: Vec<CandidateId> = election.ranked_candidates().iter().map(|c| c.id).collect();
        let second: Vec<CandidateId> = election.ranked_candidates().iter().map(|c| c.id).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 2]);
    }
}
