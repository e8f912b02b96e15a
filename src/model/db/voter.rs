use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core voter data, as stored in the database.
///
/// Invariant: `has_voted` is true iff `voted_for` is set, and `voted_at` is
/// set together with `voted_for`. The flag is monotonic: once a voter has
/// voted, no normal operation resets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub has_voted: bool,
    pub voted_for: Option<Id>,
    pub voted_at: Option<DateTime<Utc>>,
}

impl VoterCore {
    /// Create a new voter who has not yet voted.
    pub fn new() -> Self {
        Self {
            has_voted: false,
            voted_for: None,
            voted_at: None,
        }
    }

    /// Transition this voter to the voted state.
    ///
    /// Returns false and leaves the voter untouched if they had already voted.
    pub fn mark_voted(&mut self, candidate_id: Id, voted_at: DateTime<Utc>) -> bool {
        if self.has_voted {
            return false;
        }
        self.has_voted = true;
        self.voted_for = Some(candidate_id);
        self.voted_at = Some(voted_at);
        true
    }

    /// Does this voter satisfy the vote-status invariant?
    pub fn status_consistent(&self) -> bool {
        self.has_voted == self.voted_for.is_some() && self.has_voted == self.voted_at.is_some()
    }
}

impl Default for VoterCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with their unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    /// A voter with a fresh ID who has not yet voted.
    pub fn new() -> Self {
        Self {
            id: Id::new(),
            voter: VoterCore::new(),
        }
    }
}

impl Default for Voter {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
