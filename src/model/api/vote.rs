use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::candidate::Candidate};

/// A voter's request to cast their vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub candidate_id: ApiId,
}

/// The candidate a voter chose, as shown back to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotedCandidate {
    pub id: ApiId,
    pub name: String,
    pub party: String,
}

impl From<&Candidate> for VotedCandidate {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name.clone(),
            party: candidate.party.clone(),
        }
    }
}

/// A voter's own vote status, reflecting only committed transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterStatus {
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<VotedCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted_at: Option<DateTime<Utc>>,
}

impl VoterStatus {
    /// The status of a voter who has not voted.
    pub fn not_voted() -> Self {
        Self {
            has_voted: false,
            candidate: None,
            voted_at: None,
        }
    }

    /// The status of a voter who voted for the given candidate.
    pub fn voted(candidate: &Candidate, voted_at: DateTime<Utc>) -> Self {
        Self {
            has_voted: true,
            candidate: Some(candidate.into()),
            voted_at: Some(voted_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn status_omits_absent_fields() {
        let value = serde_json::to_value(VoterStatus::not_voted()).unwrap();
        assert_eq!(value, json!({"hasVoted": false}));
    }

    #[test]
    fn voted_status_includes_candidate() {
        let candidate = Candidate::new(crate::model::db::candidate::NewCandidate::example());
        let status = VoterStatus::voted(&candidate, Utc::now());
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["hasVoted"], json!(true));
        assert_eq!(value["candidate"]["name"], json!("Ada Lovelace"));
        assert!(value.get("votedAt").is_some());
    }
}
