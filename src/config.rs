//! Environment-driven configuration.
//!
//! Every knob comes from `GITSTATS_*` environment variables; unset variables
//! fall back to defaults. For example `GITSTATS_USE_CACHE=false`,
//! `GITSTATS_CACHE_TTL_DAYS=3`, or
//! `GITSTATS_IGNORED_REPOS=sandbox,playground`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use config::{ConfigError, Environment};
use serde::Deserialize;
use tracing::warn;

use crate::sync::types::{default_concurrency, DEFAULT_CACHE_TTL_DAYS};
use crate::sync::SyncOptions;

const ENV_PREFIX: &str = "GITSTATS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API token. Absent means unauthenticated, which the API will reject;
    /// kept optional so configuration loading itself never fails.
    pub token: Option<String>,
    pub use_cache: bool,
    pub cache_ttl_days: i64,
    /// Explicit fan-out override; otherwise derived from the host cores.
    pub max_concurrency: Option<usize>,
    /// Repository names excluded from sync, comma-separated in the
    /// environment.
    pub ignored_repos: Vec<String>,
    pub cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            use_cache: true,
            cache_ttl_days: DEFAULT_CACHE_TTL_DAYS,
            max_concurrency: None,
            ignored_repos: Vec::new(),
            cache_dir: PathBuf::from(".cache"),
        }
    }
}

impl Config {
    /// Load configuration from `GITSTATS_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration, falling back to defaults when the environment
    /// does not parse.
    #[must_use]
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(
                env.try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ignored_repos"),
            )
            .build()?;
        settings.try_deserialize()
    }

    /// Translate into engine options.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            use_cache: self.use_cache,
            cache_ttl: chrono::Duration::days(self.cache_ttl_days.max(0)),
            concurrency: self.max_concurrency.unwrap_or_else(default_concurrency).max(1),
            ignored_repos: self.ignored_repos.iter().cloned().collect::<BTreeSet<_>>(),
            cache_dir: self.cache_dir.clone(),
        }
    }
}
