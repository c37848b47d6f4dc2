//! Concurrent job table.
//!
//! The map lock is held only for the map operation itself; reading or
//! mutating a job goes through that job's own lock (see [`crate::job::Job`]),
//! so unrelated jobs never contend.

use crate::job::{Job, JobId, JobSnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Arc<Job>) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(job.id(), job);
    }

    pub fn get(&self, id: JobId) -> Option<Arc<Job>> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).cloned()
    }

    pub fn remove(&self, id: JobId) -> Option<Arc<Job>> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time view of every job.
    ///
    /// The job handles are copied out under the map lock; each job's own
    /// state is then read under its own lock.
    pub fn snapshot(&self) -> HashMap<JobId, JobSnapshot> {
        let jobs: Vec<Arc<Job>> = {
            let map = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            map.values().cloned().collect()
        };
        jobs.iter().map(|job| (job.id(), job.snapshot())).collect()
    }

    /// Remove every job created strictly before `cutoff`, whatever its status.
    /// Returns how many were removed.
    pub fn evict_created_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at() >= cutoff);
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!("Evicted {} jobs created before {}", evicted, cutoff);
        }
        evicted
    }
}
