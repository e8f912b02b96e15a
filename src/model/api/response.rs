use serde::{Deserialize, Serialize};

use super::candidate::CandidateResult;

/// The standard success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// An empty `data` object for acknowledgements.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyData {}

/// The results envelope, with aggregate counts alongside the data.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub success: bool,
    pub count: usize,
    pub total_votes: u64,
    pub data: Vec<CandidateResult>,
}

/// The error envelope: `{"success": false, "message": ...}`.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}
