//! Background eviction of expired jobs.
//!
//! Every `interval` the sweeper removes jobs older than `ttl`, counting age
//! from creation. Status plays no part: a job still running after `ttl` is
//! evicted too, and its worker finishes against a record nobody can query.

use crate::store::JobStore;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Evict every job created more than `ttl` before `now`.
pub fn sweep_once(store: &JobStore, now: DateTime<Utc>, ttl: Duration) -> usize {
    let cutoff = TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_sub_signed(ttl));
    match cutoff {
        Some(cutoff) => store.evict_created_before(cutoff),
        // TTL reaches past the representable past: nothing can be that old
        None => 0,
    }
}

/// Handle to the running sweep loop.
#[derive(Debug)]
pub struct Sweeper {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(store: Arc<JobStore>, interval: Duration, ttl: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let evicted = sweep_once(&store, Utc::now(), ttl);
                        if evicted > 0 {
                            info!("Sweeper evicted {} expired jobs ({} remain)", evicted, store.len());
                        }
                    }
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;

    fn aged(store: &JobStore, age: TimeDelta) -> Arc<Job> {
        let job = Arc::new(Job::with_created_at(Utc::now() - age));
        store.insert(job.clone());
        job
    }

    #[test]
    fn evicts_only_jobs_past_ttl() {
        let store = JobStore::new();
        let stale = aged(&store, TimeDelta::minutes(61));
        let fresh = aged(&store, TimeDelta::minutes(30));

        let evicted = sweep_once(&store, Utc::now(), Duration::from_secs(3600));

        assert_eq!(evicted, 1);
        assert!(store.get(stale.id()).is_none());
        assert!(store.get(fresh.id()).is_some());
    }

    #[test]
    fn absurd_ttl_evicts_nothing() {
        let store = JobStore::new();
        aged(&store, TimeDelta::days(365));
        assert_eq!(sweep_once(&store, Utc::now(), Duration::MAX), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_sweeps_on_interval_and_stops() {
        let store = Arc::new(JobStore::new());
        let stale = aged(&store, TimeDelta::hours(2));
        let fresh = aged(&store, TimeDelta::minutes(1));

        let sweeper = Sweeper::spawn(
            store.clone(),
            Duration::from_secs(30 * 60),
            Duration::from_secs(60 * 60),
        );

        // nothing happens before the first tick
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.get(stale.id()).is_some());

        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        assert!(store.get(stale.id()).is_none());
        assert!(store.get(fresh.id()).is_some());

        sweeper.stop().await;
    }
}
