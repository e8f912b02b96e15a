//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g. IDs
//! and datetimes in MongoDB's own format, snake_case field names.

pub mod admin;
pub mod candidate;
pub mod voter;

pub use admin::Admin;
pub use candidate::{Candidate, NewCandidate, VoteRecord};
pub use voter::{NewVoter, Voter};
