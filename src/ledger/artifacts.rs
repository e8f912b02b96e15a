//! Local configuration artifacts for the ledger tooling: the candidate
//! roster to sync and the deployment record produced when the contract was
//! deployed. These are inputs to administrative tooling, not part of the
//! core's runtime contract.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One candidate to be registered on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEntry {
    pub name: String,
    pub party: String,
    pub image_hash: String,
}

/// The `candidates.json` roster read by the ledger CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatesFile {
    pub candidates: Vec<CandidateEntry>,
}

/// The contract half of a deployment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub address: String,
    /// Opaque to this backend; kept verbatim for tools that need it.
    pub abi: serde_json::Value,
}

/// A deployment record (e.g. `deployments/fuji.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub contract: ContractInfo,
}

fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Parse {
        path: path.display().to_string(),
        source,
    })
}

impl CandidatesFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        load(path.as_ref())
    }
}

impl Deployment {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        load(path.as_ref())
    }
}
