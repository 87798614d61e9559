//! Rank scored runs by hard-category accuracy.

use crate::domain::{RunRecord, TrialOutcome};

/// Scored runs ordered by `hard_accuracy`, highest first.
///
/// Failed outcomes are dropped. The sort is stable, so runs with equal hard
/// accuracy keep their grid order.
pub fn rank(outcomes: &[TrialOutcome]) -> Vec<RunRecord> {
    rank_records(outcomes.iter().filter_map(|o| o.scored().cloned()).collect())
}

pub fn rank_records(mut records: Vec<RunRecord>) -> Vec<RunRecord> {
    records.sort_by(|a, b| b.hard_accuracy.total_cmp(&a.hard_accuracy));
    records
}
