//! Request pacing for the upstream API

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limiter shared by every worker of one import.
///
/// Cloning is cheap and all clones draw from the same budget.
#[derive(Clone)]
pub struct RequestLimiter {
    limiter: Arc<DirectLimiter>,
    interval: Duration,
}

impl RequestLimiter {
    /// Create a limiter admitting `requests_per_second` requests with no burst
    pub fn new(requests_per_second: f64) -> Self {
        let interval = Duration::try_from_secs_f64(1.0 / requests_per_second).unwrap_or(Duration::ZERO);
        let quota = Quota::with_period(interval).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            interval,
        }
    }

    /// Minimum spacing between two admitted requests
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request is allowed
    pub async fn wait(&self) {
        trace!(interval = ?self.interval, "Waiting for request slot");
        self.limiter.until_ready().await;
    }
}
