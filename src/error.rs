use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::status::Custom, response::Responder, serde::json::Json};
use thiserror::Error;

use crate::ballot::VoteError;
use crate::ledger::LedgerError;
use crate::model::api::response::ErrorResponse;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    OidParse(#[from] mongodb::bson::oid::Error),
    #[error(transparent)]
    BsonSer(#[from] mongodb::bson::ser::Error),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// The HTTP status this error maps to.
    fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::BsonSer(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::OidParse(_) | Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Vote(err) => match err {
                VoteError::VoterNotFound(_) | VoteError::CandidateNotFound(_) => Status::NotFound,
                VoteError::AlreadyVoted => Status::BadRequest,
                // Only reachable once the coordinator's retries are exhausted.
                VoteError::StorageConflict => Status::InternalServerError,
                VoteError::LedgerTransactionFailed(_) => Status::BadGateway,
            },
            Self::Ledger(_) => Status::BadGateway,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    /// Report the error as the standard `{success: false, message}` envelope.
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Custom(status, Json(ErrorResponse::new(self.to_string()))).respond_to(req)
    }
}
