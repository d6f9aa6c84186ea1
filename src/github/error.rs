//! GitHub API error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the GitHub GraphQL API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The API kept signalling rate limiting until the payload retry budget
    /// ran out; `wait` is the last advertised reset window.
    #[error("still rate limited after retries, last advertised wait {wait:?}")]
    RateLimited { wait: Duration },

    /// Credentials were rejected. Aborts the whole run.
    #[error("authentication failed (status {status})")]
    Auth { status: u16 },

    /// A status outside the retryable set.
    #[error("query failed with status {status}: {body}")]
    Fatal { status: u16, body: String },

    /// A retry ladder ran out of attempts.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryBudgetExhausted { attempts: u32, last_error: String },

    /// The response body was not the JSON shape we expected.
    #[error("response decode error: {0}")]
    Decode(String),
}

impl GitHubError {
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether the error means the token is unusable and the run should stop.
    #[inline]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps progress reporting
/// readable for errors that carry multi-line bodies.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}
