//! Pipeline stages for decklist-to-PDF jobs.
//!
//! Each submodule implements exactly one step; [`Pipeline`] wires them
//! together and moves the job through its lifecycle.
//!
//! ## Data Flow
//!
//! ```text
//! decklist ──▶ resolve ──▶ fetch ──▶ assemble
//!  (text)      (catalog)   (images)  (lopdf)
//! ```
//!
//! 1. [`decklist`]: parse text into ordered entries
//! 2. [`resolve`] : look each entry up in the catalog; any failure is fatal
//! 3. [`fetch`]   : download every page's artwork; failures only drop pages
//! 4. [`assemble`]: lay pages out into a PDF; runs in `spawn_blocking`
//!
//! [`limiter`] and [`retry`] are shared by steps 2 and 3.
//!
//! ## Ordering
//!
//! Steps 2 and 3 fan out one future per unit of work. Each result is written
//! to the slot matching its input position, so page order depends only on the
//! decklist and never on which request finished first.

pub mod assemble;
pub mod decklist;
pub mod fetch;
pub mod limiter;
pub mod resolve;
pub mod retry;

use crate::catalog::Catalog;
use crate::config::GrimoireConfig;
use crate::error::GrimoireError;
use crate::job::{Job, JobStatus};
use crate::output::{page_slots, total_pages, CardDocument, ResolvedCard};
use futures::stream::{self, StreamExt};
use limiter::RateLimiter;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything a worker needs to process jobs. Cheap to clone; clones share
/// one catalog client and one rate limiter.
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) config: GrimoireConfig,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) limiter: Arc<RateLimiter>,
}

impl Pipeline {
    pub fn new(config: GrimoireConfig, catalog: Arc<dyn Catalog>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_interval()));
        Self {
            config,
            catalog,
            limiter,
        }
    }

    pub fn config(&self) -> &GrimoireConfig {
        &self.config
    }

    /// Run `job` to completion: process the decklist, then record the
    /// document or the failure on the job.
    pub async fn run(&self, job: &Job, decklist: &str) {
        let outcome = self.process(job, decklist).await;
        self.settle(job, outcome);
    }

    /// Advance `job` through `parse → fetch → generate` and build its
    /// document. Leaves the job non-terminal; see [`Pipeline::settle`].
    ///
    /// An empty decklist returns a zero-page document while the job is still
    /// in `parse`.
    pub async fn process(&self, job: &Job, decklist: &str) -> Result<CardDocument, GrimoireError> {
        self.enter(job, JobStatus::Parse)?;
        let entries = decklist::parse_decklist(decklist)?;
        if entries.is_empty() {
            info!("Job {}: empty decklist", job.id());
            return assemble::assemble(self.config.layout, Vec::new()).await;
        }

        self.enter(job, JobStatus::Fetch)?;
        let cards: Vec<ResolvedCard> = resolve::resolve_all(self, job.id(), &entries).await?;
        let limit = self.config.max_pages;
        if !total_pages(&cards).is_some_and(|pages| pages <= limit) {
            return Err(GrimoireError::TooManyPages { limit });
        }
        let slots = page_slots(&cards);
        info!(
            "Job {}: {} entries resolved, {} pages to fetch",
            job.id(),
            cards.len(),
            slots.len()
        );
        let images = fetch::fetch_all(self, job.id(), &slots).await;

        self.enter(job, JobStatus::Generate)?;
        assemble::assemble(self.config.layout, images).await
    }

    /// Move `job` into its terminal state.
    pub fn settle(&self, job: &Job, outcome: Result<CardDocument, GrimoireError>) {
        let id = job.id();
        match outcome {
            Ok(document) => {
                let (pages, missing) = (document.pages, document.missing.len());
                if let Err(e) = job.complete(document) {
                    warn!("Job {}: {}", id, e);
                    return;
                }
                if missing > 0 {
                    info!("Job {}: complete, {} pages ({} missing)", id, pages, missing);
                } else {
                    info!("Job {}: complete, {} pages", id, pages);
                }
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_status(id, JobStatus::Complete);
                    cb.on_job_complete(id, pages, missing);
                }
            }
            Err(failure) => {
                let message = failure.to_string();
                if let Err(e) = job.fail(failure) {
                    warn!("Job {}: {}", id, e);
                    return;
                }
                error!("Job {} failed: {}", id, message);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_status(id, JobStatus::Error);
                }
            }
        }
    }

    fn enter(&self, job: &Job, status: JobStatus) -> Result<(), GrimoireError> {
        job.advance(status).map_err(|e| {
            warn!("Job {}: {}", job.id(), e);
            GrimoireError::Internal(e.to_string())
        })?;
        info!("Job {}: {}", job.id(), status);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_status(job.id(), status);
        }
        Ok(())
    }
}

/// Run `op` over every item concurrently and return the outputs in item
/// order, whatever order they complete in.
pub(crate) async fn fan_out<'a, T, R, F, Fut>(items: &'a [T], mut op: F) -> Vec<R>
where
    F: FnMut(usize, &'a T) -> Fut,
    Fut: Future<Output = R>,
{
    // Build every future before streaming; a `StreamExt::map` closure here
    // loses the `Send` bound callers need for `tokio::spawn`.
    let pending: Vec<_> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let fut = op(index, item);
            async move { (index, fut.await) }
        })
        .collect();
    let finished: Vec<(usize, R)> = stream::iter(pending)
        .buffer_unordered(items.len().max(1))
        .collect()
        .await;

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (index, result) in finished {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}
