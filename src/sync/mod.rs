//! Sync orchestration: partitioning, concurrent fetching, aggregation, and
//! persistence.

pub mod engine;
pub mod persist_task;
pub mod progress;
pub mod types;

pub use engine::{SyncError, SyncSession};
pub use persist_task::{
    create_artifact_channel, spawn_persist_task, PersistOutcome, RepoArtifact,
};
pub use progress::{emit, ProgressCallback, SyncProgress};
pub use types::{default_concurrency, SyncOptions, SyncOutcome};
