//! Politeness pacing for GraphQL traffic.
//!
//! Commit-history fetches are spaced out so that a wide fan-out across many
//! branches does not burst-hammer the API even when well under the documented
//! rate limit.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Minimum spacing between commit-history fetches.
pub const BRANCH_FETCH_INTERVAL: Duration = Duration::from_millis(400);

/// Shared pacer enforcing a minimum interval between paced calls.
///
/// Cloning is cheap; all clones share one limiter, so concurrent repository
/// tasks pace each other globally rather than per-task.
#[derive(Clone)]
pub struct ApiPacer {
    inner: Arc<DirectLimiter>,
}

impl ApiPacer {
    /// Create a pacer allowing one call per `min_interval`.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        // A zero interval means no pacing; governor rejects a zero period, so
        // fall back to a quota high enough to never block.
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self {
            inner: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the next paced call is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl Default for ApiPacer {
    fn default() -> Self {
        Self::new(BRANCH_FETCH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn first_call_is_not_delayed() {
        let pacer = ApiPacer::new(Duration::from_secs(10));
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn clones_share_one_limiter() {
        let pacer = ApiPacer::new(Duration::from_millis(50));
        let clone = pacer.clone();

        let start = Instant::now();
        pacer.wait().await;
        clone.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn zero_interval_falls_back_to_a_usable_quota() {
        let _ = ApiPacer::new(Duration::ZERO);
    }
}
