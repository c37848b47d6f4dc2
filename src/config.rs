//! Configuration types for the decklist-to-PDF job service.
//!
//! Every knob lives in [`GrimoireConfig`], built via its
//! [`GrimoireConfigBuilder`]. One struct is shared (cheaply cloned) by the
//! service, every worker and every fan-out task, so a job always runs with the
//! exact settings it was submitted under.

use crate::error::GrimoireError;
use crate::pipeline::retry::RetryPolicy;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default catalog endpoint.
pub const DEFAULT_CATALOG_URL: &str = "https://api.scryfall.com";

/// Configuration for the job service and its pipeline.
///
/// Built via [`GrimoireConfig::builder()`] or using
/// [`GrimoireConfig::default()`].
///
/// # Example
/// ```rust
/// use grimoire::GrimoireConfig;
///
/// let config = GrimoireConfig::builder()
///     .workers(4)
///     .queue_capacity(50)
///     .task_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GrimoireConfig {
    /// Base URL of the card catalog. Default: `https://api.scryfall.com`.
    pub catalog_url: String,

    /// `User-Agent` sent with every catalog request.
    ///
    /// Scryfall asks clients to identify themselves; anonymous agents may be
    /// rejected outright.
    pub user_agent: String,

    /// Per-request HTTP timeout in seconds. Default: 30.
    pub http_timeout_secs: u64,

    /// Minimum spacing between any two catalog calls, in milliseconds. Default: 100.
    ///
    /// Applies across all jobs and both lookup kinds; 100 ms keeps the service
    /// at or below ten requests per second.
    pub rate_limit_interval_ms: u64,

    /// Retry policy for card metadata lookups. Default: 3 attempts, 100 ms
    /// doubling, 5 s throttle base.
    pub lookup_retry: RetryPolicy,

    /// Retry policy for artwork downloads. Default: 3 attempts (2 retries),
    /// 1 s doubling, 5 s throttle base.
    pub image_retry: RetryPolicy,

    /// Upper bound on the pages one job may produce. Default: 1000.
    ///
    /// Checked after resolution, before any artwork is requested; a larger
    /// deck fails with [`GrimoireError::TooManyPages`].
    pub max_pages: usize,

    /// Number of worker tasks draining the queue. Default: available
    /// parallelism, minimum 2.
    pub workers: usize,

    /// Capacity of the task queue. Default: 100.
    ///
    /// A submission that finds the queue full is rejected immediately with
    /// [`GrimoireError::QueueFull`]; it does not wait for space.
    pub queue_capacity: usize,

    /// Deadline for processing one task, in seconds. Default: 120.
    pub task_timeout_secs: u64,

    /// How often the sweeper scans for expired jobs, in seconds. Default: 1800.
    pub sweep_interval_secs: u64,

    /// How long a job is retained after creation, in seconds. Default: 3600.
    ///
    /// Jobs are evicted on age alone, whatever their status. A finished
    /// document that has not been collected within this window is lost.
    pub job_ttl_secs: u64,

    /// Page geometry of the generated document.
    pub layout: PageLayout,

    /// Optional observer for pipeline events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GrimoireConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            user_agent: concat!("grimoire/", env!("CARGO_PKG_VERSION")).to_string(),
            http_timeout_secs: 30,
            rate_limit_interval_ms: 100,
            lookup_retry: RetryPolicy::lookup_default(),
            image_retry: RetryPolicy::image_default(),
            max_pages: 1000,
            workers: num_cpus::get().max(2),
            queue_capacity: 100,
            task_timeout_secs: 120,
            sweep_interval_secs: 30 * 60,
            job_ttl_secs: 60 * 60,
            layout: PageLayout::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GrimoireConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrimoireConfig")
            .field("catalog_url", &self.catalog_url)
            .field("user_agent", &self.user_agent)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("rate_limit_interval_ms", &self.rate_limit_interval_ms)
            .field("lookup_retry", &self.lookup_retry)
            .field("image_retry", &self.image_retry)
            .field("max_pages", &self.max_pages)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("task_timeout_secs", &self.task_timeout_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("job_ttl_secs", &self.job_ttl_secs)
            .field("layout", &self.layout)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl GrimoireConfig {
    /// Create a new builder for `GrimoireConfig`.
    pub fn builder() -> GrimoireConfigBuilder {
        GrimoireConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }
}

/// Builder for [`GrimoireConfig`].
pub struct GrimoireConfigBuilder {
    config: GrimoireConfig,
}

impl fmt::Debug for GrimoireConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrimoireConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl GrimoireConfigBuilder {
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.config.catalog_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs;
        self
    }

    pub fn rate_limit_interval_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit_interval_ms = ms;
        self
    }

    pub fn lookup_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.lookup_retry = policy;
        self
    }

    pub fn image_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.image_retry = policy;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.config.queue_capacity = n;
        self
    }

    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.task_timeout_secs = secs;
        self
    }

    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.sweep_interval_secs = secs;
        self
    }

    pub fn job_ttl_secs(mut self, secs: u64) -> Self {
        self.config.job_ttl_secs = secs;
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GrimoireConfig, GrimoireError> {
        let c = &self.config;
        if c.catalog_url.is_empty() {
            return Err(GrimoireError::InvalidConfig(
                "Catalog URL must not be empty".into(),
            ));
        }
        if c.max_pages == 0 {
            return Err(GrimoireError::InvalidConfig(
                "Max pages must be ≥ 1".into(),
            ));
        }
        if c.workers == 0 {
            return Err(GrimoireError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.queue_capacity == 0 {
            return Err(GrimoireError::InvalidConfig(
                "Queue capacity must be ≥ 1".into(),
            ));
        }
        if c.task_timeout_secs == 0 || c.sweep_interval_secs == 0 || c.job_ttl_secs == 0 {
            return Err(GrimoireError::InvalidConfig(
                "Task timeout, sweep interval and job TTL must be > 0".into(),
            ));
        }
        if c.lookup_retry.max_attempts == 0 || c.image_retry.max_attempts == 0 {
            return Err(GrimoireError::InvalidConfig(
                "Retry policies need at least one attempt".into(),
            ));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Geometry of one printed page, in PDF points (1/72 inch).
///
/// The page is the card box plus `bleed_pt` on every side. The bleed band is
/// filled with `bleed_color` so slightly-off cuts still show a clean border.
///
/// | Field | Default | |
/// |-------|---------|---|
/// | `card_width_pt`  | 180 | 2.5 in |
/// | `card_height_pt` | 252 | 3.5 in |
/// | `bleed_pt`       | 8.5 | page = 197 × 269 pt |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub card_width_pt: f32,
    pub card_height_pt: f32,
    pub bleed_pt: f32,
    /// RGB fill of the page background. Default: black.
    pub bleed_color: [u8; 3],
    /// JPEG quality used when re-encoding artwork (1–100). Default: 95.
    pub jpeg_quality: u8,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            card_width_pt: 180.0,
            card_height_pt: 252.0,
            bleed_pt: 8.5,
            bleed_color: [0, 0, 0],
            jpeg_quality: 95,
        }
    }
}

impl PageLayout {
    pub fn page_width_pt(&self) -> f32 {
        self.card_width_pt + 2.0 * self.bleed_pt
    }

    pub fn page_height_pt(&self) -> f32 {
        self.card_height_pt + 2.0 * self.bleed_pt
    }

    /// Lower-left corner of the card box in PDF user space.
    pub fn card_origin_pt(&self) -> (f32, f32) {
        (
            (self.page_width_pt() - self.card_width_pt) / 2.0,
            (self.page_height_pt() - self.card_height_pt) / 2.0,
        )
    }

    fn validate(&self) -> Result<(), GrimoireError> {
        if !(self.card_width_pt > 0.0 && self.card_height_pt > 0.0) {
            return Err(GrimoireError::InvalidConfig(format!(
                "Card size must be positive, got {}×{} pt",
                self.card_width_pt, self.card_height_pt
            )));
        }
        if !(self.bleed_pt >= 0.0) {
            return Err(GrimoireError::InvalidConfig(format!(
                "Bleed must be ≥ 0, got {} pt",
                self.bleed_pt
            )));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(GrimoireError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_constants() {
        let c = GrimoireConfig::default();
        assert_eq!(c.queue_capacity, 100);
        assert_eq!(c.task_timeout(), Duration::from_secs(120));
        assert_eq!(c.sweep_interval(), Duration::from_secs(1800));
        assert_eq!(c.job_ttl(), Duration::from_secs(3600));
        assert_eq!(c.rate_limit_interval(), Duration::from_millis(100));
        assert!(c.workers >= 2);
        assert_eq!(c.max_pages, 1000);
    }

    #[test]
    fn default_page_is_card_plus_bleed() {
        let l = PageLayout::default();
        assert_eq!(l.page_width_pt(), 197.0);
        assert_eq!(l.page_height_pt(), 269.0);
        assert_eq!(l.card_origin_pt(), (8.5, 8.5));
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let c = GrimoireConfig::builder()
            .catalog_url("http://localhost:9000/")
            .build()
            .unwrap();
        assert_eq!(c.catalog_url, "http://localhost:9000");
    }

    #[test]
    fn builder_rejects_zero_workers() {
        let err = GrimoireConfig::builder().workers(0).build().unwrap_err();
        assert!(matches!(err, GrimoireError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_page_limit() {
        let err = GrimoireConfig::builder().max_pages(0).build().unwrap_err();
        assert!(matches!(err, GrimoireError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_capacity() {
        assert!(GrimoireConfig::builder().queue_capacity(0).build().is_err());
    }

    #[test]
    fn builder_rejects_bad_layout() {
        let layout = PageLayout {
            card_width_pt: 0.0,
            ..PageLayout::default()
        };
        assert!(GrimoireConfig::builder().layout(layout).build().is_err());

        let layout = PageLayout {
            jpeg_quality: 0,
            ..PageLayout::default()
        };
        assert!(GrimoireConfig::builder().layout(layout).build().is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let c = GrimoireConfig::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        assert!(format!("{c:?}").contains("<dyn JobProgressCallback>"));
    }
}
