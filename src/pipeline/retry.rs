//! Retry with exponential backoff, shared by card lookups and image fetches.
//!
//! ## Schedule
//!
//! After failed attempt `n` (0-based) the policy sleeps
//!
//! * `throttle_delay × multiplier^n` if the catalog answered 429, or
//! * `base_delay × multiplier^n` for anything else,
//!
//! and never sleeps after the final attempt. With the lookup defaults
//! (3 attempts, 100 ms, ×2, 5 s) a flaky endpoint costs 100 ms + 200 ms and a
//! throttling one 5 s + 10 s. Every attempt, first included, first waits its
//! turn on the shared [`RateLimiter`].

use crate::error::AttemptError;
use crate::pipeline::limiter::RateLimiter;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Parameters of one retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first included. Must be ≥ 1.
    pub max_attempts: u32,
    /// Delay after the first generic failure.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: u32,
    /// Delay after the first throttled (429) failure.
    pub throttle_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(
        max_attempts: u32,
        base_delay: Duration,
        backoff_multiplier: u32,
        throttle_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_multiplier,
            throttle_delay,
        }
    }

    /// Card metadata lookups: 3 attempts, 100 ms doubling, 5 s on 429.
    pub const fn lookup_default() -> Self {
        Self::new(3, Duration::from_millis(100), 2, Duration::from_secs(5))
    }

    /// Artwork downloads: 2 retries after the first attempt, 1 s doubling,
    /// 5 s on 429.
    pub const fn image_default() -> Self {
        Self::new(3, Duration::from_secs(1), 2, Duration::from_secs(5))
    }

    /// Sleep before the attempt following failed attempt `attempt` (0-based).
    pub fn delay_after(&self, attempt: u32, error: &AttemptError) -> Duration {
        let factor = self.backoff_multiplier.saturating_pow(attempt);
        let base = if error.is_throttled() {
            self.throttle_delay
        } else {
            self.base_delay
        };
        base.saturating_mul(factor)
    }

    /// Drive `op` until it succeeds or the attempts run out.
    ///
    /// `label` only feeds the log lines.
    pub async fn run<T, F, Fut>(
        &self,
        limiter: &RateLimiter,
        label: &str,
        mut op: F,
    ) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            limiter.acquire().await;
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{}: succeeded on attempt {}", label, attempt + 1);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let made = attempt + 1;
                    if made >= max_attempts {
                        warn!("{}: giving up after {} attempts: {}", label, made, error);
                        return Err(RetryExhausted {
                            attempts: made,
                            last: error,
                        });
                    }
                    let delay = self.delay_after(attempt, &error);
                    warn!(
                        "{}: attempt {}/{} failed: {}; retrying in {:?}",
                        label, made, max_attempts, error, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
    /// Error of the final attempt; decides whether the caller reports
    /// throttling or a generic failure.
    pub last: AttemptError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_millis(100))
    }

    /// Runs `policy` over a scripted sequence of outcomes and returns the
    /// result plus the instants at which each attempt started.
    async fn scripted(
        policy: RetryPolicy,
        outcomes: Vec<Result<u32, AttemptError>>,
    ) -> (Result<u32, RetryExhausted>, Vec<Instant>) {
        let calls = Mutex::new(Vec::new());
        let script = Mutex::new(outcomes.into_iter());
        let limiter = limiter();
        let result = policy
            .run(&limiter, "test", || {
                calls.lock().unwrap().push(Instant::now());
                let next = script
                    .lock()
                    .unwrap()
                    .next()
                    .unwrap_or(Err(AttemptError::Status(500)));
                async move { next }
            })
            .await;
        (result, calls.into_inner().unwrap())
    }

    #[test]
    fn delay_schedule_doubles() {
        let p = RetryPolicy::lookup_default();
        let generic = AttemptError::Status(503);
        assert_eq!(p.delay_after(0, &generic), Duration::from_millis(100));
        assert_eq!(p.delay_after(1, &generic), Duration::from_millis(200));
        assert_eq!(p.delay_after(2, &generic), Duration::from_millis(400));
        assert_eq!(p.delay_after(0, &AttemptError::Throttled), Duration::from_secs(5));
        assert_eq!(p.delay_after(1, &AttemptError::Throttled), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_time_without_delay() {
        let (result, calls) = scripted(RetryPolicy::lookup_default(), vec![Ok(7)]).await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fail_succeed_uses_three_attempts_with_doubling_gaps() {
        let (result, calls) = scripted(
            RetryPolicy::lookup_default(),
            vec![
                Err(AttemptError::Transport("connection reset".into())),
                Err(AttemptError::Status(502)),
                Ok(1),
            ],
        )
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert!(first_gap >= Duration::from_millis(100));
        assert!(second_gap >= Duration::from_millis(200));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_throttling_follows_throttle_schedule() {
        let (result, calls) = scripted(
            RetryPolicy::lookup_default(),
            vec![
                Err(AttemptError::Throttled),
                Err(AttemptError::Throttled),
                Err(AttemptError::Throttled),
            ],
        )
        .await;

        assert_eq!(
            result,
            Err(RetryExhausted {
                attempts: 3,
                last: AttemptError::Throttled
            })
        );
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_secs(5));
        assert!(calls[2] - calls[1] >= Duration::from_secs(10));
        assert!(calls[2] - calls[1] < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn no_sleep_after_final_attempt() {
        let start = Instant::now();
        let (result, _) = scripted(
            RetryPolicy::new(2, Duration::from_millis(100), 2, Duration::from_secs(5)),
            vec![Err(AttemptError::Status(500)), Err(AttemptError::Status(500))],
        )
        .await;
        assert!(result.is_err());
        // one 100 ms backoff, nothing after the second failure
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_last_error_class() {
        let (result, _) = scripted(
            RetryPolicy::lookup_default(),
            vec![
                Err(AttemptError::Throttled),
                Err(AttemptError::Throttled),
                Err(AttemptError::Status(404)),
            ],
        )
        .await;
        assert_eq!(result.unwrap_err().last, AttemptError::Status(404));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let (result, calls) = scripted(
            RetryPolicy::new(0, Duration::from_millis(1), 2, Duration::from_millis(1)),
            vec![Ok(3)],
        )
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.len(), 1);
    }
}
