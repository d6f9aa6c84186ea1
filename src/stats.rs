//! Pure aggregation of commit data into yearly buckets and the date index.
//!
//! Everything here is deterministic and side-effect free: fragments produced
//! per repository are merged into run-wide aggregates by the sync engine, and
//! the same merge functions combine cached fragments with freshly fetched
//! ones. `merge_yearly` is a pointwise sum, so merge order does not matter;
//! `merge_date_index` replaces whole `(repository, branch)` slots so that a
//! re-fetch supersedes stale commit lists instead of unioning with them.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Added/deleted line counts for one language within a quarter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangDelta {
    pub add: u64,
    pub del: u64,
}

/// Yearly aggregate: year -> quarter (1..=4) -> language -> line deltas.
pub type YearlyStats = BTreeMap<i32, BTreeMap<u8, BTreeMap<String, LangDelta>>>;

/// Date index: repository -> branch -> commit id -> commit date (YYYY-MM-DD).
pub type DateIndex = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Calendar quarter for a 1-based month.
#[must_use]
pub fn quarter_of(month: u32) -> u8 {
    ((month - 1) / 3 + 1) as u8
}

/// Parse the day out of a commit timestamp.
///
/// Accepts full RFC 3339 timestamps as returned by the API, and falls back to
/// reading a leading `YYYY-MM-DD` so that locally cached values survive.
#[must_use]
pub fn commit_day(timestamp: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.date_naive());
    }
    let prefix = timestamp.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Add one commit's line deltas to the yearly aggregate.
pub fn record_commit(
    yearly: &mut YearlyStats,
    language: &str,
    day: NaiveDate,
    additions: u64,
    deletions: u64,
) {
    use chrono::Datelike;

    let slot = yearly
        .entry(day.year())
        .or_default()
        .entry(quarter_of(day.month()))
        .or_default()
        .entry(language.to_string())
        .or_default();
    slot.add += additions;
    slot.del += deletions;
}

/// Merge `src` into `dst` by pointwise sum of line deltas.
pub fn merge_yearly(dst: &mut YearlyStats, src: &YearlyStats) {
    for (year, quarters) in src {
        let dst_year = dst.entry(*year).or_default();
        for (quarter, languages) in quarters {
            let dst_quarter = dst_year.entry(*quarter).or_default();
            for (language, delta) in languages {
                let slot = dst_quarter.entry(language.clone()).or_default();
                slot.add += delta.add;
                slot.del += delta.del;
            }
        }
    }
}

/// Merge `src` into `dst`, replacing each `(repository, branch)` slot
/// wholesale. Commit-id maps are never unioned across sources.
pub fn merge_date_index(dst: &mut DateIndex, src: &DateIndex) {
    for (repo, branches) in src {
        let dst_repo = dst.entry(repo.clone()).or_default();
        for (branch, commits) in branches {
            dst_repo.insert(branch.clone(), commits.clone());
        }
    }
}
