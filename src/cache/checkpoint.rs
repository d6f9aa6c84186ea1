//! Run checkpoint for crash resumption.
//!
//! The checkpoint lists repositories whose records were made durable during
//! the current (possibly interrupted) run. On the next run a checkpointed
//! repository is reused even if its index entry looks stale or is missing:
//! after an interruption, availability wins over freshness. The checkpoint is
//! reset only when a run completes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{write_json_atomic, CacheError};

const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    processed_repos: Vec<String>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    state: CheckpointFile,
}

impl Checkpoint {
    /// Load the checkpoint from the cache directory. Missing or corrupt
    /// files start empty.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CHECKPOINT_FILE);
        let state = match std::fs::read(&path) {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt checkpoint, starting empty");
                    CheckpointFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckpointFile::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read checkpoint, starting empty");
                CheckpointFile::default()
            }
        };
        Self { path, state }
    }

    #[must_use]
    pub fn contains(&self, repo: &str) -> bool {
        self.state.processed_repos.iter().any(|r| r == repo)
    }

    #[must_use]
    pub fn processed(&self) -> &[String] {
        &self.state.processed_repos
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.state.completed_at
    }

    /// Append `repo` to the processed list, preserving insertion order.
    /// Re-marking an already listed repository is a no-op.
    pub fn mark_processed(&mut self, repo: &str) {
        if !self.contains(repo) {
            self.state.processed_repos.push(repo.to_string());
        }
    }

    /// Write the checkpoint atomically.
    pub fn save(&self) -> Result<(), CacheError> {
        write_json_atomic(&self.path, &self.state)
    }

    /// Clear the processed list and stamp the completion time. Called once a
    /// run has finished; an interrupted run never reaches this.
    pub fn reset(&mut self, completed_at: DateTime<Utc>) -> Result<(), CacheError> {
        self.state.processed_repos.clear();
        self.state.completed_at = Some(completed_at);
        self.save()
    }
}
