//! Retry ladders for the GraphQL client.
//!
//! Two independent budgets are tracked:
//!
//! * the transport ladder handles HTTP-level failures (403 with a reset
//!   header, 403 without one, 502, connection errors) with exponential
//!   backoff;
//! * the payload ladder handles 200 responses whose `errors` array signals
//!   GraphQL-level rate limiting, waiting out the advertised reset window.
//!
//! Responses that fit neither ladder are fatal and surface immediately.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

/// Attempts allowed on the transport ladder before giving up.
pub const TRANSPORT_MAX_ATTEMPTS: u32 = 10;

/// Attempts allowed on the payload ladder before giving up.
pub const PAYLOAD_MAX_ATTEMPTS: u32 = 20;

/// Wait applied when a rate-limit error carries no usable reset hint.
pub const PAYLOAD_FALLBACK_WAIT: Duration = Duration::from_secs(60);

/// Ceiling on the payload ladder's escalating backoff.
pub const PAYLOAD_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Floor on the wait derived from a reset header; guards against clock skew
/// producing a zero or negative window.
pub const MIN_RESET_WAIT: Duration = Duration::from_secs(1);

/// Exponential backoff for the transport ladder: 1s, 2s, 4s, ... for
/// zero-based `attempt`.
#[must_use]
pub fn transport_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(16))
}

/// Escalating backoff for the payload ladder applied to second and later
/// retries: the advertised wait multiplied by the number of prior retries,
/// capped at [`PAYLOAD_MAX_BACKOFF`].
#[must_use]
pub fn payload_backoff(wait: Duration, prior_retries: u32) -> Duration {
    wait.saturating_mul(prior_retries).min(PAYLOAD_MAX_BACKOFF)
}

/// Derive a wait from an `x-ratelimit-reset` header value (Unix epoch
/// seconds). Returns `None` when the header does not parse.
#[must_use]
pub fn wait_from_reset_epoch(header: &str, now: DateTime<Utc>) -> Option<Duration> {
    let reset_epoch: i64 = header.trim().parse().ok()?;
    let remaining = reset_epoch - now.timestamp();
    if remaining <= 0 {
        Some(MIN_RESET_WAIT)
    } else {
        Some(Duration::from_secs(remaining as u64).max(MIN_RESET_WAIT))
    }
}

/// Whether a GraphQL error object signals rate limiting: either its `type`
/// is `RATE_LIMIT` or its message mentions a rate limit.
#[must_use]
pub fn is_rate_limit_error(error: &Value) -> bool {
    if error.get("type").and_then(Value::as_str) == Some("RATE_LIMIT") {
        return true;
    }
    error
        .get("message")
        .and_then(Value::as_str)
        .map(|m| m.to_ascii_lowercase().contains("rate limit"))
        .unwrap_or(false)
}

fn try_again_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"try again in (\d+) seconds").expect("hardcoded pattern is valid")
    })
}

/// Derive the wait for a GraphQL rate-limit error.
///
/// Reset hints are consulted in priority order: the `resetAt` timestamp under
/// `extensions.rateLimit`, then a "try again in N seconds" phrase in the
/// message, then [`PAYLOAD_FALLBACK_WAIT`].
#[must_use]
pub fn wait_from_graphql_error(error: &Value, now: DateTime<Utc>) -> Duration {
    if let Some(reset_at) = error
        .get("extensions")
        .and_then(|e| e.get("rateLimit"))
        .and_then(|r| r.get("resetAt"))
        .and_then(Value::as_str)
    {
        if let Ok(reset) = DateTime::parse_from_rfc3339(reset_at) {
            let remaining = reset.with_timezone(&Utc) - now;
            let secs = remaining.num_seconds().max(1) as u64;
            return Duration::from_secs(secs);
        }
    }

    if let Some(message) = error.get("message").and_then(Value::as_str) {
        if let Some(caps) = try_again_regex().captures(message) {
            if let Some(secs) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                return Duration::from_secs(secs.max(1));
            }
        }
    }

    PAYLOAD_FALLBACK_WAIT
}
