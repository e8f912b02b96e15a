use crate::model::{
    api::{
        candidate::CandidateResult,
        response::ResultsResponse,
    },
    db::Candidate,
};

/// Aggregated election results: a ranked tally over the candidate ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectionResults {
    pub count: usize,
    pub total_votes: u64,
    pub results: Vec<CandidateResult>,
}

/// Derive ranked, percentage-annotated tallies from a snapshot of the
/// candidate ledger.
///
/// Pure function of its input: ordering is total votes descending with ties
/// broken by candidate ID ascending, and percentages are zero across the
/// board when no votes have been cast.
pub fn compute_results(mut candidates: Vec<Candidate>) -> ElectionResults {
    candidates.sort_by(|a, b| {
        b.total_votes
            .cmp(&a.total_votes)
            .then_with(|| a.id.cmp(&b.id))
    });

    let count = candidates.len();
    let total_votes: u64 = candidates.iter().map(|c| c.total_votes).sum();

    let results = candidates
        .into_iter()
        .map(|candidate| {
            let vote_percentage = if total_votes > 0 {
                candidate.total_votes as f64 / total_votes as f64 * 100.0
            } else {
                0.0
            };
            CandidateResult {
                candidate: candidate.into(),
                vote_percentage,
            }
        })
        .collect();

    ElectionResults {
        count,
        total_votes,
        results,
    }
}

impl From<ElectionResults> for ResultsResponse {
    fn from(results: ElectionResults) -> Self {
        Self {
            success: true,
            count: results.count,
            total_votes: results.total_votes,
            data: results.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::model::db::candidate::CandidateCore;
    use crate::model::mongodb::Id;

    use super::*;

    fn candidate_with_votes(core: CandidateCore, votes: usize) -> Candidate {
        let mut candidate = Candidate::new(core);
        for _ in 0..votes {
            candidate.push_vote(Id::new(), Utc::now());
        }
        candidate
    }

    #[test]
    fn zero_votes_means_zero_percentages() {
        let candidates = vec![
            Candidate::new(CandidateCore::example()),
            Candidate::new(CandidateCore::example2()),
        ];
        let results = compute_results(candidates);

        assert_eq!(results.count, 2);
        assert_eq!(results.total_votes, 0);
        assert_eq!(results.results.len(), 2);
        for entry in &results.results {
            assert_eq!(entry.vote_percentage, 0.0);
        }
    }

    #[test]
    fn ranked_by_votes_then_id() {
        let leader = candidate_with_votes(CandidateCore::example(), 3);
        let runner_up = candidate_with_votes(CandidateCore::example2(), 1);
        let tied_a = candidate_with_votes(CandidateCore::example(), 2);
        let tied_b = candidate_with_votes(CandidateCore::example2(), 2);
        let (low, high) = if tied_a.id < tied_b.id {
            (tied_a.id, tied_b.id)
        } else {
            (tied_b.id, tied_a.id)
        };

        let results = compute_results(vec![runner_up.clone(), tied_b, leader.clone(), tied_a]);

        assert_eq!(*results.results[0].candidate.id, leader.id);
        // The tied pair rank between leader (3) and runner-up (1), lower ID first.
        assert_eq!(*results.results[1].candidate.id, low);
        assert_eq!(*results.results[2].candidate.id, high);
        assert_eq!(*results.results[3].candidate.id, runner_up.id);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let candidates = vec![
            candidate_with_votes(CandidateCore::example(), 2),
            candidate_with_votes(CandidateCore::example2(), 1),
        ];
        let results = compute_results(candidates);

        assert_eq!(results.total_votes, 3);
        let sum: f64 = results.results.iter().map(|r| r.vote_percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let candidates = vec![
            candidate_with_votes(CandidateCore::example(), 5),
            candidate_with_votes(CandidateCore::example2(), 2),
        ];
        let first = compute_results(candidates.clone());
        let second = compute_results(candidates);
        assert_eq!(first, second);
    }
}
