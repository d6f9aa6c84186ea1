//! Incremental synchronization of per-repository commit statistics from the
//! GitHub GraphQL API.
//!
//! The crate fetches every branch of every repository a user owns, walks the
//! commit history authored by that user, and aggregates line counts into
//! yearly quarter-by-language buckets plus a per-branch commit date index.
//! Results are cached per repository with a TTL, and a checkpoint makes
//! interrupted runs resumable without refetching finished repositories.
//!
//! Typical use:
//!
//! ```ignore
//! use std::sync::Arc;
//! use gitstats_sync::http::reqwest_transport::ReqwestTransport;
//! use gitstats_sync::{Config, GraphQlClient, SyncSession};
//!
//! let config = Config::load()?;
//! let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
//! let client = GraphQlClient::new(config.token.clone().unwrap_or_default(), transport);
//!
//! let viewer = client.viewer().await?;
//! let repos = client.list_repositories(&viewer.login).await?;
//!
//! let session = SyncSession::new(client, config.sync_options());
//! let outcome = session.sync(&repos, &viewer.id, None).await?;
//! println!("{}", outcome.to_json());
//! ```

pub mod cache;
pub mod config;
pub mod github;
pub mod http;
pub mod rate_limit;
pub mod retry;
pub mod stats;
pub mod sync;

pub use cache::{CacheError, CacheIndex, CacheRecord, CacheStore, Checkpoint};
pub use config::Config;
pub use github::{GitHubError, GraphQlClient, Repository, Viewer};
pub use rate_limit::ApiPacer;
pub use stats::{DateIndex, LangDelta, YearlyStats};
pub use sync::{
    ProgressCallback, SyncError, SyncOptions, SyncOutcome, SyncProgress, SyncSession,
};
