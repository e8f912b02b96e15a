//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way: IDs as
//! hex strings, camelCase field names matching the public service boundary.

pub mod auth;
pub mod candidate;
pub mod id;
pub mod response;
pub mod vote;
