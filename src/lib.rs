//! # grimoire
//!
//! Turn a trading-card decklist into a printable proxy PDF.
//!
//! ## Why this crate?
//!
//! Playtesting a deck before buying it means printing proxies: one page per
//! card face, sized exactly like the real card, with a dark bleed margin so
//! an imprecise cut still looks clean. Doing that by hand means hunting down
//! artwork for every printing and every back face. This crate takes the
//! decklist text a deckbuilding site exports, looks each printing up in the
//! Scryfall catalog, downloads the artwork and lays it out page by page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! decklist text
//!  │
//!  ├─ 1. Parse     "4 Lightning Bolt (lea) 162" → ordered entries
//!  ├─ 2. Resolve   catalog lookup per entry (fan-out, rate limited, retried)
//!  ├─ 3. Fetch     artwork per (card, copy, face) (fan-out, failures skipped)
//!  └─ 4. Assemble  one 197 × 269 pt page per image (spawn_blocking, lopdf)
//! ```
//!
//! Jobs run on a bounded worker pool behind [`JobService`]; each job moves
//! through `queued → parse → fetch → generate → complete | error` and is
//! evicted an hour after creation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grimoire::{GrimoireConfig, JobService};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = JobService::new(GrimoireConfig::default())?;
//!     let id = service.submit("4 Lightning Bolt (lea) 162\n1 Delver of Secrets // Insectile Aberration (isd) 51")?;
//!
//!     let pdf = service.wait(id, Duration::from_millis(250)).await?;
//!     eprintln!("{} pages, {} missing", pdf.pages, pdf.missing.len());
//!     std::fs::write("proxies.pdf", &pdf.bytes)?;
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `grimoire` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! grimoire = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{CardMetadata, Catalog, ScryfallCatalog};
pub use config::{GrimoireConfig, GrimoireConfigBuilder, PageLayout, DEFAULT_CATALOG_URL};
pub use error::{AttemptError, FetchError, GrimoireError, ResultError};
pub use job::{JobId, JobSnapshot, JobStatus};
pub use output::{CardDocument, Face, ResolvedCard};
pub use pipeline::retry::RetryPolicy;
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::JobService;
