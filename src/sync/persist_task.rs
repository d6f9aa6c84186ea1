//! Single-writer persistence task.
//!
//! Repository tasks complete in arbitrary order across the fan-out; all cache
//! mutation funnels through one task reading from an mpsc channel, so the
//! record store, the index, and the checkpoint never see concurrent writers.
//!
//! For each artifact the write order is fixed: record file first, then the
//! index entry pointing at it, then the checkpoint entry. A crash between
//! steps can leave an orphaned record, which is harmless; it can never leave
//! an index or checkpoint entry pointing at a record that does not exist.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::cache::{CacheIndex, CacheRecord, CacheStore, Checkpoint};

use super::progress::{emit, ProgressCallback, SyncProgress};
use super::types::PERSIST_CHANNEL_CAPACITY;

/// Cache artifacts for one completed repository.
#[derive(Debug)]
pub struct RepoArtifact {
    /// Real repository name; the cache key.
    pub name: String,
    /// Masked name for logs and progress events.
    pub display_name: String,
    pub record: CacheRecord,
}

/// What the persist task hands back after the channel closes.
#[derive(Debug)]
pub struct PersistOutcome {
    pub saved: usize,
    /// `(display_name, message)` per artifact that could not be persisted.
    pub errors: Vec<(String, String)>,
    pub index: CacheIndex,
    pub checkpoint: Checkpoint,
}

impl PersistOutcome {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Create the artifact channel with the standard capacity.
#[must_use]
pub fn create_artifact_channel() -> (mpsc::Sender<RepoArtifact>, mpsc::Receiver<RepoArtifact>) {
    mpsc::channel(PERSIST_CHANNEL_CAPACITY)
}

/// Spawn the persist task. It drains the channel until every sender is
/// dropped, then returns the index and checkpoint it owned.
///
/// A failed write skips the remaining steps for that artifact and is
/// reported; it never aborts the task.
pub fn spawn_persist_task(
    store: CacheStore,
    mut index: CacheIndex,
    mut checkpoint: Checkpoint,
    mut rx: mpsc::Receiver<RepoArtifact>,
    on_progress: Option<Arc<ProgressCallback>>,
) -> JoinHandle<PersistOutcome> {
    tokio::spawn(async move {
        let mut saved = 0usize;
        let mut errors: Vec<(String, String)> = Vec::new();

        while let Some(artifact) = rx.recv().await {
            let RepoArtifact {
                name,
                display_name,
                record,
            } = artifact;

            if let Err(e) = store.put(&name, &record) {
                error!(repo = %display_name, error = %e, "failed to write cache record");
                emit(
                    on_progress.as_deref(),
                    SyncProgress::PersistError {
                        name: display_name.clone(),
                        error: e.to_string(),
                    },
                );
                errors.push((display_name, e.to_string()));
                continue;
            }

            index.record(&name, record.cached_at);
            if let Err(e) = index.flush() {
                error!(repo = %display_name, error = %e, "failed to write cache index");
                emit(
                    on_progress.as_deref(),
                    SyncProgress::PersistError {
                        name: display_name.clone(),
                        error: e.to_string(),
                    },
                );
                errors.push((display_name, e.to_string()));
                continue;
            }

            checkpoint.mark_processed(&name);
            if let Err(e) = checkpoint.save() {
                error!(repo = %display_name, error = %e, "failed to write checkpoint");
                emit(
                    on_progress.as_deref(),
                    SyncProgress::PersistError {
                        name: display_name.clone(),
                        error: e.to_string(),
                    },
                );
                errors.push((display_name, e.to_string()));
                continue;
            }

            saved += 1;
            debug!(repo = %display_name, "persisted cache artifacts");
            emit(
                on_progress.as_deref(),
                SyncProgress::Persisted { name: display_name },
            );
        }

        PersistOutcome {
            saved,
            errors,
            index,
            checkpoint,
        }
    })
}
