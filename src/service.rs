//! The job service: the one surface collaborators use.
//!
//! Submission, status and result queries, listing, and an orderly shutdown
//! that stops the sweeper and drains the worker pool.

use crate::catalog::{Catalog, ScryfallCatalog};
use crate::config::GrimoireConfig;
use crate::error::{GrimoireError, ResultError};
use crate::job::{Job, JobId, JobSnapshot, JobStatus, Task};
use crate::output::CardDocument;
use crate::pipeline::Pipeline;
use crate::store::JobStore;
use crate::sweeper::Sweeper;
use crate::worker::WorkerPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decklist-to-PDF job service.
///
/// Constructing one starts the worker pool and the cleanup sweeper, so it
/// must happen inside a tokio runtime. Call [`JobService::shutdown`] before
/// dropping it to let queued work finish.
///
/// # Example
///
/// ```rust,no_run
/// use grimoire::{GrimoireConfig, JobService};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = JobService::new(GrimoireConfig::default())?;
///     let id = service.submit("4 Lightning Bolt (lea) 162")?;
///     let document = service.wait(id, Duration::from_millis(250)).await?;
///     std::fs::write("proxies.pdf", &document.bytes)?;
///     service.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct JobService {
    store: Arc<JobStore>,
    pool: WorkerPool,
    sweeper: Mutex<Option<Sweeper>>,
}

impl JobService {
    /// Start a service backed by the HTTP catalog at `config.catalog_url`.
    pub fn new(config: GrimoireConfig) -> Result<Self, GrimoireError> {
        let catalog = ScryfallCatalog::new(&config)?;
        Ok(Self::with_catalog(config, Arc::new(catalog)))
    }

    /// Start a service backed by any [`Catalog`].
    pub fn with_catalog(config: GrimoireConfig, catalog: Arc<dyn Catalog>) -> Self {
        let store = Arc::new(JobStore::new());
        let sweeper = Sweeper::spawn(Arc::clone(&store), config.sweep_interval(), config.job_ttl());
        let pipeline = Arc::new(Pipeline::new(config, catalog));
        let pool = WorkerPool::spawn(pipeline, Arc::clone(&store));

        Self {
            store,
            pool,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Create a job for `decklist` and queue it.
    ///
    /// If the queue is full or closed the job is removed again and the
    /// error is returned; no trace of the submission remains.
    pub fn submit(&self, decklist: impl Into<String>) -> Result<JobId, GrimoireError> {
        let job = Arc::new(Job::new());
        let id = job.id();
        self.store.insert(job);

        let task = Task {
            job_id: id,
            decklist: decklist.into(),
        };
        if let Err(e) = self.pool.enqueue(task) {
            self.store.remove(id);
            warn!("Submission rejected: {}", e);
            return Err(e);
        }

        debug!("Job {} queued ({} waiting)", id, self.pool.queued());
        Ok(id)
    }

    /// Current status, or `None` if the job is unknown or already swept.
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.store.get(id).map(|job| job.status())
    }

    pub fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        self.store.get(id).map(|job| job.snapshot())
    }

    /// The finished document.
    pub fn result(&self, id: JobId) -> Result<Arc<CardDocument>, ResultError> {
        self.store.get(id).ok_or(ResultError::NotFound)?.result()
    }

    /// Every known job.
    pub fn list(&self) -> HashMap<JobId, JobSnapshot> {
        self.store.snapshot()
    }

    /// Poll every `interval` until the job is terminal, then return its
    /// result.
    pub async fn wait(
        &self,
        id: JobId,
        interval: Duration,
    ) -> Result<Arc<CardDocument>, ResultError> {
        loop {
            let job = self.store.get(id).ok_or(ResultError::NotFound)?;
            if job.status().is_terminal() {
                return job.result();
            }
            drop(job);
            tokio::time::sleep(interval).await;
        }
    }

    /// Stop the sweeper, refuse new submissions, and wait until every
    /// queued task has been processed.
    pub async fn shutdown(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            info!("Shutting down job service");
            sweeper.stop().await;
        }
        self.pool.shutdown().await;
    }
}
