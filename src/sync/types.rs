//! Shared types and tuning constants for sync operations.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::Duration;
use serde_json::json;

use crate::stats::{DateIndex, YearlyStats};

/// Default cache time-to-live.
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 7;

/// Bounds on the repository fan-out.
pub const MIN_CONCURRENCY: usize = 2;
pub const MAX_CONCURRENCY: usize = 16;

/// Buffered artifacts between repository tasks and the persist task.
pub const PERSIST_CHANNEL_CAPACITY: usize = 64;

/// Concurrency derived from the host: one task per core, clamped to
/// [`MIN_CONCURRENCY`]..=[`MAX_CONCURRENCY`].
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_CONCURRENCY)
        .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Options controlling a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Whether the cache, index, and checkpoint are consulted and written.
    pub use_cache: bool,
    /// Age beyond which a cached repository is re-fetched.
    pub cache_ttl: Duration,
    /// Maximum repositories synchronized at once.
    pub concurrency: usize,
    /// Repository names excluded from the run entirely.
    pub ignored_repos: BTreeSet<String>,
    /// Directory holding records, the index, and the checkpoint.
    pub cache_dir: PathBuf,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_ttl: Duration::days(DEFAULT_CACHE_TTL_DAYS),
            concurrency: default_concurrency(),
            ignored_repos: BTreeSet::new(),
            cache_dir: PathBuf::from(".cache"),
        }
    }
}

/// Result of a sync run.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub yearly: YearlyStats,
    pub dates: DateIndex,
    /// Repositories fetched from the API this run.
    pub fetched: usize,
    /// Repositories served from the cache.
    pub reused: usize,
    /// Repositories skipped because they have no branches.
    pub skipped: usize,
    /// Per-repository failures: `(name, message)`. Failures here are
    /// non-fatal; the aggregates cover every repository that succeeded.
    pub failed: Vec<(String, String)>,
}

impl SyncOutcome {
    /// Snapshot of both aggregates as a two-element JSON array, the shape
    /// consumed by downstream renderers.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!([self.yearly, self.dates])
    }
}
