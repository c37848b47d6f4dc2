//! Global spacing between outbound catalog calls.
//!
//! A single [`RateLimiter`] is shared by the resolver and the image fetcher
//! of every job in the service. Holding its mutex across the wait makes the
//! check-sleep-record sequence atomic, so concurrent callers are admitted one
//! at a time, each at least `interval` after the previous one.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Monitor enforcing a minimum interval between permitted calls.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for this caller's turn, then record it.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            if ready_at > Instant::now() {
                trace!("Rate limiter: waiting {:?}", ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
