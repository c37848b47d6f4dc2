//! Job records and their lifecycle state machine.
//!
//! ```text
//! queued ──▶ parse ──▶ fetch ──▶ generate ──▶ complete
//!              │                                 ▲
//!              └──────── (empty decklist) ───────┘
//!
//! any non-terminal state ──▶ error
//! ```
//!
//! The document and the failure live *inside* the terminal variants of the
//! job's phase, so "document iff complete, failure iff error" holds by
//! construction. Terminal phases reject every further transition.

use crate::error::{GrimoireError, ResultError};
use crate::output::CardDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Opaque job identifier (random UUID, never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Externally visible lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Parse,
    Fetch,
    Generate,
    Complete,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Parse => "parse",
            JobStatus::Fetch => "fetch",
            JobStatus::Generate => "generate",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (from, Error) => !from.is_terminal(),
            (Queued, Parse) | (Parse, Fetch) | (Fetch, Generate) | (Generate, Complete) => true,
            // empty decklist
            (Parse, Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "parse" => Ok(JobStatus::Parse),
            "fetch" => Ok(JobStatus::Fetch),
            "generate" => Ok(JobStatus::Generate),
            "complete" => Ok(JobStatus::Complete),
            "error" => Ok(JobStatus::Error),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("illegal job transition {from} → {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

#[derive(Debug)]
enum Phase {
    Queued,
    Parse,
    Fetch,
    Generate,
    Complete(Arc<CardDocument>),
    Error(GrimoireError),
}

impl Phase {
    fn status(&self) -> JobStatus {
        match self {
            Phase::Queued => JobStatus::Queued,
            Phase::Parse => JobStatus::Parse,
            Phase::Fetch => JobStatus::Fetch,
            Phase::Generate => JobStatus::Generate,
            Phase::Complete(_) => JobStatus::Complete,
            Phase::Error(_) => JobStatus::Error,
        }
    }
}

/// One submitted decklist and its progress.
///
/// Readers take the job's own read lock; the worker that owns the job takes
/// its write lock for each transition. No lock is shared between jobs.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    created_at: DateTime<Utc>,
    phase: RwLock<Phase>,
}

impl Job {
    pub(crate) fn new() -> Self {
        Self::with_created_at(Utc::now())
    }

    pub(crate) fn with_created_at(created_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            created_at,
            phase: RwLock::new(Phase::Queued),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> JobStatus {
        self.read(|p| p.status())
    }

    /// The failure, if the job ended in `error`.
    pub fn failure(&self) -> Option<GrimoireError> {
        self.read(|p| match p {
            Phase::Error(e) => Some(e.clone()),
            _ => None,
        })
    }

    /// The finished document, or why there is none.
    pub fn result(&self) -> Result<Arc<CardDocument>, ResultError> {
        self.read(|p| match p {
            Phase::Complete(doc) => Ok(Arc::clone(doc)),
            Phase::Error(e) => Err(ResultError::Failed(e.clone())),
            other => Err(ResultError::NotReady(other.status())),
        })
    }

    /// A consistent point-in-time view, taken under one read lock.
    pub fn snapshot(&self) -> JobSnapshot {
        self.read(|p| {
            let (error, pages, missing_pages) = match p {
                Phase::Complete(doc) => (None, Some(doc.pages), Some(doc.missing.len())),
                Phase::Error(e) => (Some(e.to_string()), None, None),
                _ => (None, None, None),
            };
            JobSnapshot {
                id: self.id,
                status: p.status(),
                created_at: self.created_at,
                error,
                pages,
                missing_pages,
            }
        })
    }

    /// Move to a non-terminal stage.
    pub(crate) fn advance(&self, next: JobStatus) -> Result<(), TransitionError> {
        let phase = match next {
            JobStatus::Parse => Phase::Parse,
            JobStatus::Fetch => Phase::Fetch,
            JobStatus::Generate => Phase::Generate,
            other => {
                return Err(TransitionError {
                    from: self.status(),
                    to: other,
                })
            }
        };
        self.transition(phase)
    }

    pub(crate) fn complete(&self, document: CardDocument) -> Result<(), TransitionError> {
        self.transition(Phase::Complete(Arc::new(document)))
    }

    pub(crate) fn fail(&self, error: GrimoireError) -> Result<(), TransitionError> {
        self.transition(Phase::Error(error))
    }

    fn transition(&self, next: Phase) -> Result<(), TransitionError> {
        let mut guard = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        let from = guard.status();
        let to = next.status();
        if !from.can_transition_to(to) {
            return Err(TransitionError { from, to });
        }
        *guard = next;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Phase) -> T) -> T {
        let guard = self.phase.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

/// Serialisable status view of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pages in the finished document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    /// Pages dropped because their artwork could not be fetched or decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_pages: Option<usize>,
}

/// The immutable payload handed to the task queue.
#[derive(Debug, Clone)]
pub struct Task {
    pub job_id: JobId,
    pub decklist: String,
}
