//! Durable local cache: per-repository records, the freshness index, and the
//! run checkpoint.
//!
//! All three artifacts are JSON files under one cache directory. Writes go
//! through a write-then-rename so readers never observe a half-written file.

pub mod checkpoint;
pub mod index;
pub mod store;

use std::path::Path;

use thiserror::Error;

pub use checkpoint::Checkpoint;
pub use index::CacheIndex;
pub use store::{CacheRecord, CacheStore};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Serialize `value` to `path` atomically: write to a sibling temp file, then
/// rename over the destination.
pub(crate) fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), CacheError> {
    let tmp = path.with_extension("tmp");
    let data = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
