use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    db::candidate::{Candidate, NewCandidate},
};

/// An admin's request to create or edit a candidate.
///
/// Every field is descriptive metadata; the vote list and running total are
/// never writable through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
    pub photo: String,
    pub symbol: String,
}

impl CandidateSpec {
    /// Reject specs with empty descriptive fields.
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("name", &self.name),
            ("party", &self.party),
            ("photo", &self.photo),
            ("symbol", &self.symbol),
        ] {
            if value.trim().is_empty() {
                return Err(Error::bad_request(format!(
                    "Candidate {field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

impl From<CandidateSpec> for NewCandidate {
    fn from(spec: CandidateSpec) -> Self {
        NewCandidate::new(spec.name, spec.party, spec.photo, spec.symbol)
    }
}

/// A candidate as presented over the API, without the raw vote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub photo: String,
    pub symbol: String,
    pub total_votes: u64,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            photo: candidate.candidate.photo,
            symbol: candidate.candidate.symbol,
            total_votes: candidate.candidate.total_votes,
            created_at: candidate.candidate.created_at,
        }
    }
}

/// One entry in the ranked results: a candidate plus their vote share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    #[serde(flatten)]
    pub candidate: CandidateDescription,
    pub vote_percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> CandidateSpec {
        CandidateSpec {
            name: "Ada Lovelace".to_string(),
            party: "Analytical Party".to_string(),
            photo: "candidate_ada.jpg".to_string(),
            symbol: "symbol_gear.png".to_string(),
        }
    }

    #[test]
    fn spec_validation() {
        assert!(spec().validate().is_ok());

        let mut blank_party = spec();
        blank_party.party = "  ".to_string();
        assert!(blank_party.validate().is_err());
    }

    #[test]
    fn description_is_camel_case() {
        let description = CandidateDescription::from(Candidate::new(spec().into()));
        let value = serde_json::to_value(&description).unwrap();
        assert!(value.get("totalVotes").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("total_votes").is_none());
    }
}
