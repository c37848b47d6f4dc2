//! Progress-callback trait for per-job pipeline events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::GrimoireConfigBuilder::progress_callback`] to observe jobs
//! as workers move them through the pipeline. The callback is shared by every
//! worker, so each event carries the [`JobId`] it belongs to.
//!
//! # Example
//!
//! ```rust
//! use grimoire::{GrimoireConfig, JobId, JobProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct MissingArt {
//!     count: AtomicUsize,
//! }
//!
//! impl JobProgressCallback for MissingArt {
//!     fn on_image_error(&self, _job: JobId, _index: usize, _total: usize, error: &str) {
//!         self.count.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("missing art: {error}");
//!     }
//! }
//!
//! let config = GrimoireConfig::builder()
//!     .progress_callback(Arc::new(MissingArt { count: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::job::{JobId, JobStatus};
use std::sync::Arc;

/// Called by workers as they process a job.
///
/// Implementations must be `Send + Sync`: card and image events for one job
/// arrive concurrently from fan-out tasks, and events for different jobs
/// arrive from different workers. All methods default to no-ops.
pub trait JobProgressCallback: Send + Sync {
    /// The job entered a new lifecycle state.
    fn on_status(&self, job: JobId, status: JobStatus) {
        let _ = (job, status);
    }

    /// One decklist entry was resolved against the catalog.
    ///
    /// * `index`: 0-based entry position
    /// * `total`: number of entries in the decklist
    fn on_card_resolved(&self, job: JobId, index: usize, total: usize, name: &str) {
        let _ = (job, index, total, name);
    }

    /// One artwork image finished downloading.
    fn on_image_fetched(&self, job: JobId, index: usize, total: usize, bytes: usize) {
        let _ = (job, index, total, bytes);
    }

    /// One artwork image failed after all retries; its page will be skipped.
    fn on_image_error(&self, job: JobId, index: usize, total: usize, error: &str) {
        let _ = (job, index, total, error);
    }

    /// The job reached `complete`.
    ///
    /// * `pages`  : pages written to the document
    /// * `missing`: pages dropped because their artwork was unavailable
    fn on_job_complete(&self, job: JobId, pages: usize, missing: usize) {
        let _ = (job, pages, missing);
    }
}

/// No-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GrimoireConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;
