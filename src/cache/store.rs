//! Per-repository cache records.
//!
//! Each synchronized repository gets one JSON file holding its aggregated
//! fragments. Records are the durable source of truth for the reuse path: a
//! missing or unreadable record degrades that repository back to a fetch, it
//! never fails the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::stats::{DateIndex, YearlyStats};

use super::{write_json_atomic, CacheError};

/// Cached aggregation output for one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub yearly: YearlyStats,
    pub dates: DateIndex,
    pub cached_at: DateTime<Utc>,
    #[serde(default)]
    pub language: Option<String>,
}

/// File-backed store of per-repository records.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open (and create if needed) the store under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, repo: &str) -> PathBuf {
        self.dir.join(format!("{}_commits.json", sanitize(repo)))
    }

    /// Read the record for `repo`. Missing and unreadable records both come
    /// back as `None`; a corrupt file is logged and treated as absent.
    #[must_use]
    pub fn get(&self, repo: &str) -> Option<CacheRecord> {
        let path = self.record_path(repo);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache record");
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache record, ignoring");
                None
            }
        }
    }

    /// Write the record for `repo` atomically.
    pub fn put(&self, repo: &str, record: &CacheRecord) -> Result<(), CacheError> {
        write_json_atomic(&self.record_path(repo), record)
    }

    /// Remove every record file in the store directory. The cache index and
    /// checkpoint live in the same directory and are left alone.
    pub fn clear(&self) -> Result<(), CacheError> {
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_commits.json"));
            if is_record {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Keep record filenames portable: anything outside `[A-Za-z0-9._-]` becomes
/// a dash.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}
