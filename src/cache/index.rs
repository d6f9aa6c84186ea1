//! The freshness index: repository name -> last successful cache time.
//!
//! The index is read once when a sync starts and afterwards only mutated by
//! the persist task, so staleness decisions are stable for the whole run. An
//! index entry is only written after its record file is durable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::{write_json_atomic, CacheError};

const INDEX_FILE: &str = "cache_index.json";

#[derive(Debug)]
pub struct CacheIndex {
    path: PathBuf,
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl CacheIndex {
    /// Load the index from the cache directory. A missing or corrupt index
    /// file starts empty, which degrades every repository to a fetch.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(INDEX_FILE);
        let entries = match std::fs::read(&path) {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt cache index, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache index, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    #[must_use]
    pub fn last_cached_at(&self, repo: &str) -> Option<DateTime<Utc>> {
        self.entries.get(repo).copied()
    }

    /// Whether the entry for `repo` exists and is younger than `ttl`.
    #[must_use]
    pub fn is_fresh(&self, repo: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.last_cached_at(repo) {
            Some(cached_at) => now - cached_at <= ttl,
            None => false,
        }
    }

    pub fn record(&mut self, repo: &str, at: DateTime<Utc>) {
        self.entries.insert(repo.to_string(), at);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the index atomically.
    pub fn flush(&self) -> Result<(), CacheError> {
        write_json_atomic(&self.path, &self.entries)
    }
}
