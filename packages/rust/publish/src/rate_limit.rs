//! Minimum-interval gate between outbound publish calls.
//!
//! The KB ingestion API is rate limited upstream; the publisher pauses for
//! a fixed interval after every call regardless of outcome. Centralizing
//! the wait here keeps the constraint in one place should publishing ever
//! fan out concurrently.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Enforces a fixed spacing between calls.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    pauses: AtomicUsize,
}

impl RateLimiter {
    /// Create a limiter with the given inter-call interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pauses: AtomicUsize::new(0),
        }
    }

    /// Create a limiter from a millisecond interval.
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Block for one interval. Called once after every publish call.
    pub async fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.interval).await;
    }

    /// Number of pauses taken so far.
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn pause_waits_and_counts() {
        let limiter = RateLimiter::from_millis(10);
        let start = Instant::now();

        limiter.pause().await;
        limiter.pause().await;
        limiter.pause().await;

        assert_eq!(limiter.pauses(), 3);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
