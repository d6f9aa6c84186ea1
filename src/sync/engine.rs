//! Sync orchestration.
//!
//! A [`SyncSession`] partitions repositories into fetch and reuse sets, fans
//! the fetch set out across semaphore-bounded tasks, merges per-repository
//! fragments into run-wide aggregates, and finalizes the checkpoint once the
//! run completes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::cache::{CacheError, CacheIndex, CacheRecord, CacheStore, Checkpoint};
use crate::github::error::{short_error_message, GitHubError};
use crate::github::queries::Query;
use crate::github::types::{BranchNode, CommitNode, Repository};
use crate::github::GraphQlClient;
use crate::rate_limit::ApiPacer;
use crate::stats::{self, DateIndex, YearlyStats};

use super::persist_task::{create_artifact_channel, spawn_persist_task, RepoArtifact};
use super::progress::{emit, ProgressCallback, SyncProgress};
use super::types::{SyncOptions, SyncOutcome};

/// Errors that abort a whole sync run. Per-repository failures are reported
/// through [`SyncOutcome::failed`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The API rejected the token. Nothing useful can be fetched, and the
    /// checkpoint is left in place so the next run resumes.
    #[error("authentication failed against the GitHub API")]
    Auth,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("sync task panicked: {0}")]
    TaskPanic(String),
}

/// One sync run's worth of orchestration state.
pub struct SyncSession {
    client: GraphQlClient,
    pacer: ApiPacer,
    options: SyncOptions,
}

/// Outcome of one repository task.
enum RepoTaskResult {
    Fetched {
        display_name: String,
        yearly: YearlyStats,
        dates: DateIndex,
        branches: usize,
        commits: usize,
    },
    Skipped {
        display_name: String,
    },
    Failed {
        display_name: String,
        auth: bool,
        message: String,
    },
}

impl SyncSession {
    pub fn new(client: GraphQlClient, options: SyncOptions) -> Self {
        Self {
            client,
            pacer: ApiPacer::default(),
            options,
        }
    }

    /// Replace the politeness pacer, mainly to shorten intervals in tests.
    #[must_use]
    pub fn with_pacer(mut self, pacer: ApiPacer) -> Self {
        self.pacer = pacer;
        self
    }

    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Synchronize `repos`, counting only commits authored by `author_id`
    /// (the viewer's node id).
    ///
    /// Ignored repositories are dropped up front. With caching enabled, each
    /// remaining repository is served from its cache record when the
    /// checkpoint lists it or its index entry is fresh; everything else is
    /// fetched. Fetched repositories are persisted as they complete, so an
    /// interrupted run resumes where it stopped.
    pub async fn sync(
        &self,
        repos: &[Repository],
        author_id: &str,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> Result<SyncOutcome, SyncError> {
        let now = Utc::now();
        let mut outcome = SyncOutcome::default();

        let (active, ignored): (Vec<_>, Vec<_>) = repos
            .iter()
            .cloned()
            .partition(|r| !self.options.ignored_repos.contains(&r.name));

        let cache = if self.options.use_cache {
            Some((
                CacheStore::new(&self.options.cache_dir)?,
                CacheIndex::load(&self.options.cache_dir),
                Checkpoint::load(&self.options.cache_dir),
            ))
        } else {
            None
        };

        // Partition into fetch and reuse sets. A reusable repository whose
        // record file turns out to be missing or corrupt degrades to a fetch.
        let mut to_fetch: Vec<Repository> = Vec::new();
        let mut reused: Vec<(Repository, CacheRecord)> = Vec::new();
        match &cache {
            Some((store, index, checkpoint)) => {
                for repo in active {
                    if should_reuse(&repo.name, checkpoint, index, self.options.cache_ttl, now) {
                        match store.get(&repo.name) {
                            Some(record) => {
                                emit(
                                    on_progress.as_deref(),
                                    SyncProgress::CacheHit {
                                        name: repo.display_name(),
                                    },
                                );
                                reused.push((repo, record));
                            }
                            None => {
                                warn!(repo = %repo.display_name(), "cache record unavailable, re-fetching");
                                emit(
                                    on_progress.as_deref(),
                                    SyncProgress::CacheMiss {
                                        name: repo.display_name(),
                                    },
                                );
                                to_fetch.push(repo);
                            }
                        }
                    } else {
                        to_fetch.push(repo);
                    }
                }
            }
            None => to_fetch = active,
        }

        info!(
            fetch = to_fetch.len(),
            reuse = reused.len(),
            ignored = ignored.len(),
            "partitioned repositories"
        );
        emit(
            on_progress.as_deref(),
            SyncProgress::Partitioned {
                fetch: to_fetch.len(),
                reuse: reused.len(),
                ignored: ignored.len(),
            },
        );

        for (_, record) in &reused {
            stats::merge_yearly(&mut outcome.yearly, &record.yearly);
            stats::merge_date_index(&mut outcome.dates, &record.dates);
        }
        outcome.reused = reused.len();

        let (persist_handle, artifact_tx) = match cache {
            Some((store, index, checkpoint)) => {
                let (tx, rx) = create_artifact_channel();
                let handle =
                    spawn_persist_task(store, index, checkpoint, rx, on_progress.clone());
                (Some(handle), Some(tx))
            }
            None => (None, None),
        };

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut handles = Vec::with_capacity(to_fetch.len());
        for repo in to_fetch {
            emit(
                on_progress.as_deref(),
                SyncProgress::FetchingRepo {
                    name: repo.display_name(),
                },
            );

            let client = self.client.clone();
            let pacer = self.pacer.clone();
            let semaphore = Arc::clone(&semaphore);
            let tx = artifact_tx.clone();
            let author_id = author_id.to_string();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                fetch_repo(&client, &pacer, &repo, &author_id, tx).await
            }));
        }
        // The persist channel must close once every repository task is done.
        drop(artifact_tx);

        let mut auth_failed = false;
        for handle in handles {
            match handle.await {
                Ok(RepoTaskResult::Fetched {
                    display_name,
                    yearly,
                    dates,
                    branches,
                    commits,
                }) => {
                    stats::merge_yearly(&mut outcome.yearly, &yearly);
                    stats::merge_date_index(&mut outcome.dates, &dates);
                    outcome.fetched += 1;
                    emit(
                        on_progress.as_deref(),
                        SyncProgress::RepoFetched {
                            name: display_name,
                            branches,
                            commits,
                        },
                    );
                }
                Ok(RepoTaskResult::Skipped { display_name }) => {
                    outcome.skipped += 1;
                    emit(
                        on_progress.as_deref(),
                        SyncProgress::RepoSkipped { name: display_name },
                    );
                }
                Ok(RepoTaskResult::Failed {
                    display_name,
                    auth,
                    message,
                }) => {
                    auth_failed |= auth;
                    warn!(repo = %display_name, error = %message, "repository sync failed");
                    emit(
                        on_progress.as_deref(),
                        SyncProgress::RepoFailed {
                            name: display_name.clone(),
                            error: message.clone(),
                        },
                    );
                    outcome.failed.push((display_name, message));
                }
                Err(e) => return Err(SyncError::TaskPanic(e.to_string())),
            }
        }

        // Let the persist task drain before deciding how the run ended, so
        // already fetched repositories stay durable even on an auth abort.
        if let Some(handle) = persist_handle {
            let persisted = handle
                .await
                .map_err(|e| SyncError::TaskPanic(e.to_string()))?;
            if persisted.has_errors() {
                warn!(
                    errors = persisted.errors.len(),
                    "some cache artifacts could not be persisted"
                );
            }
            if auth_failed {
                return Err(SyncError::Auth);
            }
            let mut checkpoint = persisted.checkpoint;
            checkpoint.reset(Utc::now())?;
        } else if auth_failed {
            return Err(SyncError::Auth);
        }

        info!(
            fetched = outcome.fetched,
            reused = outcome.reused,
            skipped = outcome.skipped,
            failed = outcome.failed.len(),
            "sync complete"
        );
        emit(
            on_progress.as_deref(),
            SyncProgress::SyncComplete {
                fetched: outcome.fetched,
                reused: outcome.reused,
                failed: outcome.failed.len(),
            },
        );
        Ok(outcome)
    }
}

/// Reuse when the checkpoint lists the repository, regardless of index
/// freshness: after an interruption, availability wins over staleness.
fn should_reuse(
    repo: &str,
    checkpoint: &Checkpoint,
    index: &CacheIndex,
    ttl: Duration,
    now: DateTime<Utc>,
) -> bool {
    checkpoint.contains(repo) || index.is_fresh(repo, ttl, now)
}

/// Fetch and aggregate one repository: list branches, then walk each
/// branch's commit history restricted to `author_id`.
async fn fetch_repo(
    client: &GraphQlClient,
    pacer: &ApiPacer,
    repo: &Repository,
    author_id: &str,
    artifact_tx: Option<mpsc::Sender<RepoArtifact>>,
) -> RepoTaskResult {
    let display_name = repo.display_name();

    let failed = {
        let display_name = display_name.clone();
        move |e: &GitHubError| RepoTaskResult::Failed {
            display_name: display_name.clone(),
            auth: e.is_auth(),
            message: short_error_message(e),
        }
    };

    let branch_nodes = match client
        .paginate(
            Query::BranchList,
            &[("owner", &repo.owner), ("name", &repo.name)],
        )
        .await
    {
        Ok(nodes) => nodes,
        Err(e) => return failed(&e),
    };

    let mut branch_names = Vec::with_capacity(branch_nodes.len());
    for node in branch_nodes {
        match serde_json::from_value::<BranchNode>(node) {
            Ok(branch) => branch_names.push(branch.name),
            Err(e) => warn!(repo = %display_name, error = %e, "skipping undecodable branch node"),
        }
    }

    if branch_names.is_empty() {
        warn!(repo = %display_name, "repository has no branches, skipping");
        return RepoTaskResult::Skipped { display_name };
    }

    let mut yearly = YearlyStats::new();
    let mut dates = DateIndex::new();
    let mut commit_count = 0usize;

    for branch in &branch_names {
        pacer.wait().await;
        let commit_nodes = match client
            .paginate(
                Query::CommitList,
                &[
                    ("owner", &repo.owner),
                    ("name", &repo.name),
                    ("branch", branch),
                    ("id", author_id),
                ],
            )
            .await
        {
            Ok(nodes) => nodes,
            Err(e) => return failed(&e),
        };

        let branch_dates = dates
            .entry(repo.name.clone())
            .or_default()
            .entry(branch.clone())
            .or_default();

        for node in commit_nodes {
            let commit: CommitNode = match serde_json::from_value(node) {
                Ok(commit) => commit,
                Err(e) => {
                    warn!(repo = %display_name, error = %e, "skipping undecodable commit node");
                    continue;
                }
            };
            let Some(day) = stats::commit_day(&commit.committed_date) else {
                warn!(repo = %display_name, oid = %commit.oid, "commit has unparseable date, skipping");
                continue;
            };
            branch_dates.insert(commit.oid, day.format("%Y-%m-%d").to_string());
            // Repositories without a primary language still contribute commit
            // dates, just nothing to the yearly line counts.
            if let Some(language) = &repo.primary_language {
                stats::record_commit(&mut yearly, language, day, commit.additions, commit.deletions);
            }
            commit_count += 1;
        }
    }

    if let Some(tx) = artifact_tx {
        let record = CacheRecord {
            yearly: yearly.clone(),
            dates: dates.clone(),
            cached_at: Utc::now(),
            language: repo.primary_language.clone(),
        };
        if tx
            .send(RepoArtifact {
                name: repo.name.clone(),
                display_name: display_name.clone(),
                record,
            })
            .await
            .is_err()
        {
            warn!(repo = %display_name, "persist channel closed before artifact was sent");
        }
    }

    RepoTaskResult::Fetched {
        display_name,
        yearly,
        dates,
        branches: branch_names.len(),
        commits: commit_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_overrides_a_stale_index_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let now = Utc::now();
        let ttl = Duration::days(7);

        let mut checkpoint = Checkpoint::load(dir.path());
        checkpoint.mark_processed("interrupted");

        let mut index = CacheIndex::load(dir.path());
        index.record("interrupted", now - Duration::days(30));

        assert!(should_reuse("interrupted", &checkpoint, &index, ttl, now));
    }

    #[test]
    fn checkpoint_covers_repos_missing_from_the_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let checkpoint = {
            let mut c = Checkpoint::load(dir.path());
            c.mark_processed("a");
            c
        };
        let index = CacheIndex::load(dir.path());

        assert!(should_reuse(
            "a",
            &checkpoint,
            &index,
            Duration::days(7),
            Utc::now()
        ));
        assert!(!should_reuse(
            "b",
            &checkpoint,
            &index,
            Duration::days(7),
            Utc::now()
        ));
    }

    #[test]
    fn fresh_index_entry_is_reused_without_checkpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let now = Utc::now();
        let checkpoint = Checkpoint::load(dir.path());
        let mut index = CacheIndex::load(dir.path());
        index.record("fresh", now - Duration::days(1));
        index.record("stale", now - Duration::days(8));

        let ttl = Duration::days(7);
        assert!(should_reuse("fresh", &checkpoint, &index, ttl, now));
        assert!(!should_reuse("stale", &checkpoint, &index, ttl, now));
    }
}
