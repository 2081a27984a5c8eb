use std::collections::BTreeMap;

use crate::model::{CheckKind, CheckRecord};

use super::options::RetrySelection;

/// Mean of the scores of completed records, rounded half up; 0 when none.
pub fn overall_score<'a, I>(records: I) -> u8
where
    I: IntoIterator<Item = &'a CheckRecord>,
{
    let scores: Vec<u8> = records
        .into_iter()
        .filter(|record| record.is_completed())
        .filter_map(|record| record.score)
        .collect();
    mean_round_half_up(&scores)
}

pub(crate) fn mean_round_half_up(scores: &[u8]) -> u8 {
    if scores.is_empty() {
        return 0;
    }
    let count = scores.len() as u64;
    let sum: u64 = scores.iter().map(|score| u64::from(*score)).sum();
    // floor((sum / count) + 0.5) in integers
    ((2 * sum + count) / (2 * count)) as u8
}

/// Latest terminal record per kind. `history` must be in creation order.
pub(crate) fn latest_terminal_per_kind(history: &[CheckRecord]) -> BTreeMap<CheckKind, &CheckRecord> {
    let mut latest = BTreeMap::new();
    for record in history.iter().filter(|record| record.status.is_terminal()) {
        latest.insert(record.kind, record);
    }
    latest
}

/// Kinds a retry should re-run, in order of first appearance.
///
/// A record that never reached a terminal status belongs to an aborted run
/// and always makes its kind eligible.
pub(crate) fn retryable_kinds(history: &[CheckRecord], selection: RetrySelection) -> Vec<CheckKind> {
    let latest = latest_terminal_per_kind(history);
    let mut kinds = Vec::new();
    for record in history {
        let eligible = !record.status.is_terminal()
            || match selection {
                RetrySelection::AnyFailed => record.is_failed(),
                RetrySelection::LatestFailed => latest
                    .get(&record.kind)
                    .map(|latest| latest.is_failed())
                    .unwrap_or(false),
            };
        if eligible && !kinds.contains(&record.kind) {
            kinds.push(record.kind);
        }
    }
    kinds
}
