//! CLI binary for grimoire.
//!
//! A thin shim over the library crate: maps CLI flags to `GrimoireConfig`,
//! submits one decklist to a local `JobService` and writes the PDF.

use anyhow::{Context, Result};
use clap::Parser;
use grimoire::{
    GrimoireConfig, JobId, JobProgressCallback, JobService, JobStatus, PageLayout,
    ProgressCallback, DEFAULT_CATALOG_URL,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while parsing and resolving, then a bar over the artwork
/// downloads. Images complete out of order, so the bar only counts.
struct CliProgressCallback {
    bar: ProgressBar,
    resolved: AtomicUsize,
    image_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let cb = Self::with_bar(ProgressBar::new(0));
        cb.bar.enable_steady_tick(Duration::from_millis(80));
        cb
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Queued");

        Arc::new(Self {
            bar,
            resolved: AtomicUsize::new(0),
            image_errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the counting style once the number of images is known.
    fn activate_bar(&self, total: usize) {
        if self.bar.length() == Some(total as u64) {
            return;
        }
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Fetching");
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_status(&self, _job: JobId, status: JobStatus) {
        match status {
            JobStatus::Parse => self.bar.set_prefix("Parsing"),
            JobStatus::Fetch => self.bar.set_prefix("Resolving"),
            JobStatus::Generate => {
                self.bar.set_prefix("Assembling");
                self.bar.set_message("laying out pages…");
            }
            JobStatus::Error => self.bar.finish_and_clear(),
            JobStatus::Queued | JobStatus::Complete => {}
        }
    }

    fn on_card_resolved(&self, _job: JobId, _index: usize, total: usize, name: &str) {
        let done = self.resolved.fetch_add(1, Ordering::SeqCst) + 1;
        if done == total {
            self.bar.set_prefix("Fetching");
            self.bar.set_message("downloading artwork…");
        } else {
            self.bar.set_message(format!("{done}/{total}  {name}"));
        }
    }

    fn on_image_fetched(&self, _job: JobId, _index: usize, total: usize, _bytes: usize) {
        self.activate_bar(total);
        self.bar.inc(1);
    }

    fn on_image_error(&self, _job: JobId, index: usize, total: usize, error: &str) {
        self.activate_bar(total);
        self.image_errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, _job: JobId, pages: usize, missing: usize) {
        self.bar.finish_and_clear();
        if missing == 0 {
            eprintln!("{} {} pages assembled", green("✔"), bold(&pages.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages assembled  ({} missing)",
                cyan("⚠"),
                bold(&pages.to_string()),
                pages + missing,
                red(&missing.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"DECKLIST FORMAT:
  One card per line:  <quantity> <name> (<set code>) <collector number>

    4 Lightning Bolt (lea) 162
    1 Delver of Secrets // Insectile Aberration (isd) 51
    1 Sol Ring (plst) C21-263

  Blank lines are ignored. Double-faced cards get a page per face.

EXAMPLES:
  # Print a decklist exported from a deckbuilder
  grimoire deck.txt -o deck.pdf

  # Read from stdin
  pbpaste | grimoire - -o proxies.pdf

  # Thicker bleed, fail if any artwork is missing
  grimoire --bleed 12 --fail-on-missing deck.txt

  # Job summary as JSON on stdout
  grimoire --json deck.txt > summary.json

PAGE GEOMETRY:
  Card box 180 × 252 pt (2.5 × 3.5 in), centred on a page grown by the
  bleed on every side. Default bleed 8.5 pt → 197 × 269 pt pages.

ENVIRONMENT VARIABLES:
  GRIMOIRE_CATALOG_URL   Catalog base URL (default https://api.scryfall.com)
  RUST_LOG               Overrides -v / -q log filtering
"#;

/// Turn a decklist into a printable proxy PDF.
#[derive(Parser, Debug)]
#[command(
    name = "grimoire",
    version,
    about = "Turn a trading-card decklist into a printable proxy PDF",
    long_about = "Turn a trading-card decklist into a printable proxy PDF. Every printing is \
looked up in the Scryfall catalog, its artwork downloaded, and each card face laid out on its \
own bleed-margined page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Decklist file, or `-` for stdin.
    input: String,

    /// Write the PDF here. Default: the input name with a `.pdf` extension.
    #[arg(short, long, env = "GRIMOIRE_OUTPUT")]
    output: Option<PathBuf>,

    /// Catalog base URL.
    #[arg(long, env = "GRIMOIRE_CATALOG_URL", default_value = DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Minimum milliseconds between catalog requests.
    #[arg(long, env = "GRIMOIRE_RATE_LIMIT_MS", default_value_t = 100)]
    rate_limit_ms: u64,

    /// Job deadline in seconds.
    #[arg(long, env = "GRIMOIRE_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "GRIMOIRE_HTTP_TIMEOUT", default_value_t = 30)]
    http_timeout: u64,

    /// Bleed margin around each card, in points.
    #[arg(long, env = "GRIMOIRE_BLEED", default_value_t = 8.5)]
    bleed: f32,

    /// JPEG quality for embedded artwork (1–100).
    #[arg(long, env = "GRIMOIRE_JPEG_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Refuse decklists that expand to more pages than this.
    #[arg(long, env = "GRIMOIRE_MAX_PAGES", default_value_t = 1000)]
    max_pages: usize,

    /// Exit with an error if any page's artwork could not be used.
    #[arg(long)]
    fail_on_missing: bool,

    /// Print the job snapshot as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "GRIMOIRE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GRIMOIRE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GRIMOIRE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let decklist = read_decklist(&cli.input)?;
    let output_path = cli.output.clone().unwrap_or_else(|| default_output(&cli.input));

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run the job ──────────────────────────────────────────────────────
    let service = JobService::new(config).context("Failed to start job service")?;
    let id = service
        .submit(decklist)
        .context("Failed to submit decklist")?;
    let outcome = service.wait(id, Duration::from_millis(100)).await;
    let snapshot = service.snapshot(id);
    service.shutdown().await;

    if cli.json {
        if let Some(ref snapshot) = snapshot {
            println!(
                "{}",
                serde_json::to_string_pretty(snapshot).context("Failed to serialise snapshot")?
            );
        }
    }

    let document = outcome.context("Job failed")?;
    write_atomically(&output_path, &document.bytes)?;

    if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}  →  {}",
            if document.is_partial() {
                cyan("⚠")
            } else {
                green("✔")
            },
            document.pages,
            dim(&format!("{} KiB", document.bytes.len() / 1024)),
            bold(&output_path.display().to_string()),
        );
        if !show_progress {
            for missing in &document.missing {
                eprintln!("  {} {}", red("✗"), missing);
            }
        }
    }

    if cli.fail_on_missing && document.is_partial() {
        anyhow::bail!(
            "{} page(s) had no usable artwork",
            document.missing.len()
        );
    }
    Ok(())
}

/// Map CLI args to `GrimoireConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GrimoireConfig> {
    let layout = PageLayout {
        bleed_pt: cli.bleed,
        jpeg_quality: cli.jpeg_quality,
        ..PageLayout::default()
    };

    let mut builder = GrimoireConfig::builder()
        .catalog_url(cli.catalog_url.as_str())
        .rate_limit_interval_ms(cli.rate_limit_ms)
        .task_timeout_secs(cli.timeout)
        .http_timeout_secs(cli.http_timeout)
        .max_pages(cli.max_pages)
        .layout(layout)
        // one job per invocation
        .workers(1);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn read_decklist(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read decklist from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read decklist from {:?}", input))
    }
}

fn default_output(input: &str) -> PathBuf {
    if input == "-" {
        PathBuf::from("decklist.pdf")
    } else {
        Path::new(input).with_extension("pdf")
    }
}

/// Write via a temp file in the destination directory, then rename, so a
/// failed run never leaves a truncated PDF behind.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
    tmp.write_all(bytes)
        .context("Failed to write PDF to temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
