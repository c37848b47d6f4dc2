//! Error types for the grimoire library.
//!
//! Failures are split by how far they travel:
//!
//! * [`GrimoireError`]: **Fatal**: the job (or the submission itself) cannot
//!   produce a document. Decklist syntax errors, unresolvable cards, a blown
//!   task deadline and PDF encoding failures all end here. It is `Clone` so a
//!   failed job can hand the same error to every status query.
//!
//! * [`FetchError`]: **Non-fatal**: one artwork image could not be
//!   downloaded. The page is dropped and the job still completes; the error is
//!   reported through [`crate::progress::ProgressCallback`] and counted in the
//!   job's `missing_pages`.
//!
//! * [`ResultError`]: the three ways a result query can come back empty.
//!
//! * [`AttemptError`]: one failed call to the catalog, classified so the
//!   retry policy can tell provider throttling apart from everything else.

use crate::job::JobStatus;
use thiserror::Error;

/// All fatal errors returned by the grimoire library.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrimoireError {
    // ── Decklist errors ───────────────────────────────────────────────────
    /// A non-blank decklist line matched neither the strict nor the
    /// permissive entry pattern.
    #[error("Could not parse line {line}: {content:?}\nExpected: <quantity> <name> (<set>) <collector number>")]
    Parse { line: usize, content: String },

    // ── Resolution errors ─────────────────────────────────────────────────
    /// The metadata lookup kept failing (transport or non-success status).
    #[error("Lookup failed for {set_code}/{collector_number} after {attempts} attempts: {detail}")]
    Lookup {
        set_code: String,
        collector_number: String,
        attempts: u32,
        detail: String,
    },

    /// The metadata lookup kept being throttled by the catalog (HTTP 429).
    #[error("Catalog rate limited {set_code}/{collector_number} after {attempts} attempts")]
    Throttled {
        set_code: String,
        collector_number: String,
        attempts: u32,
    },

    /// More than one entry failed to resolve. `first` is the earliest failure
    /// in decklist order.
    #[error("{failed}/{total} cards failed to resolve. First error: {first}")]
    Resolution {
        failed: usize,
        total: usize,
        first: Box<GrimoireError>,
    },

    /// The resolved decklist expands to more pages than the configured limit.
    #[error("Decklist needs more than {limit} pages")]
    TooManyPages { limit: usize },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The PDF document could not be encoded.
    #[error("PDF assembly failed: {0}")]
    Assembly(String),

    // ── Lifecycle errors ──────────────────────────────────────────────────
    /// The task exceeded its processing deadline.
    #[error("Job timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The task queue is at capacity; the submission was rejected.
    #[error("Task queue is full (capacity {capacity}); try again later")]
    QueueFull { capacity: usize },

    /// The service is shutting down and no longer accepts submissions.
    #[error("Job service is shut down")]
    ShutDown,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single artwork image.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FetchError {
    /// Download failed after every retry.
    #[error("Image {index}: fetch of {url} failed after {attempts} attempts: {detail}")]
    Exhausted {
        index: usize,
        url: String,
        attempts: u32,
        detail: String,
    },

    /// Bytes arrived but could not be decoded as a raster image.
    #[error("Image {index}: undecodable artwork from {url}: {detail}")]
    Undecodable {
        index: usize,
        url: String,
        detail: String,
    },
}

/// Why [`crate::JobService::result`] returned no document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResultError {
    /// No job with this id exists (never created, or already swept).
    #[error("Job not found")]
    NotFound,

    /// The job has not reached a terminal state yet.
    #[error("Job not complete, current status: {0}")]
    NotReady(JobStatus),

    /// The job ended in `error`.
    #[error("Job failed: {0}")]
    Failed(GrimoireError),
}

/// One failed call to the external catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// The request never produced a usable response (connect, timeout, body
    /// read or decode failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// The catalog answered with a non-success status other than 429.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The catalog answered 429 Too Many Requests.
    #[error("HTTP 429 Too Many Requests")]
    Throttled,
}

impl AttemptError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, AttemptError::Throttled)
    }
}
