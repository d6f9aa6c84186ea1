//! Progress reporting for sync operations.
//!
//! Events are emitted through an optional callback so callers can drive a
//! terminal UI or structured logs without the engine knowing about either.

/// Progress events emitted during a sync run.
///
/// Repository names in events are display names: private repositories are
/// already masked.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// The run has been partitioned into work sets.
    Partitioned {
        fetch: usize,
        reuse: usize,
        ignored: usize,
    },

    /// Starting to fetch one repository from the API.
    FetchingRepo { name: String },

    /// A repository finished fetching and aggregating.
    RepoFetched {
        name: String,
        branches: usize,
        commits: usize,
    },

    /// A repository was served from the cache.
    CacheHit { name: String },

    /// A cached repository had no readable record and degraded to a fetch.
    CacheMiss { name: String },

    /// A repository was skipped because it has no branches.
    RepoSkipped { name: String },

    /// A repository failed; the run continues.
    RepoFailed { name: String, error: String },

    /// A repository's record, index entry, and checkpoint entry are durable.
    Persisted { name: String },

    /// Writing a repository's cache artifacts failed; the run continues.
    PersistError { name: String, error: String },

    /// The run finished.
    SyncComplete {
        fetched: usize,
        reused: usize,
        failed: usize,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
