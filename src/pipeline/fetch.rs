//! Artwork download: one concurrent retry sequence per page slot.
//!
//! Unlike resolution, a failed download never fails the job. The slot keeps
//! its position and carries a [`FetchError`]; the assembler leaves that page
//! out.

use crate::catalog::Catalog;
use crate::error::FetchError;
use crate::job::JobId;
use crate::output::PageSlot;
use crate::pipeline::limiter::RateLimiter;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::{fan_out, Pipeline};
use tracing::{debug, warn};

/// Outcome for one page slot, at the slot's index.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub index: usize,
    pub url: String,
    pub bytes: Result<Vec<u8>, FetchError>,
}

/// Download one image, retrying per `policy`.
pub async fn fetch_image(
    catalog: &dyn Catalog,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    index: usize,
    url: &str,
) -> Result<Vec<u8>, FetchError> {
    let label = format!("image {}", index);
    policy
        .run(limiter, &label, || catalog.image(url))
        .await
        .map_err(|exhausted| FetchError::Exhausted {
            index,
            url: url.to_string(),
            attempts: exhausted.attempts,
            detail: exhausted.last.to_string(),
        })
}

/// Fetch every slot. The result has exactly `slots.len()` entries, entry `i`
/// belonging to `slots[i]`, whatever order the downloads finished in.
pub(crate) async fn fetch_all(
    pipeline: &Pipeline,
    job: JobId,
    slots: &[PageSlot],
) -> Vec<FetchedImage> {
    let total = slots.len();
    let images = fan_out(slots, |index, slot| async move {
        let bytes = fetch_image(
            pipeline.catalog.as_ref(),
            &pipeline.limiter,
            &pipeline.config.image_retry,
            index,
            &slot.url,
        )
        .await;

        match &bytes {
            Ok(data) => {
                debug!(
                    "Image {}/{} ({} {}): {} bytes",
                    index + 1,
                    total,
                    slot.name,
                    slot.face,
                    data.len()
                );
                if let Some(cb) = &pipeline.config.progress_callback {
                    cb.on_image_fetched(job, index, total, data.len());
                }
            }
            Err(e) => {
                warn!("Skipping page {} ({} {}): {}", index + 1, slot.name, slot.face, e);
                if let Some(cb) = &pipeline.config.progress_callback {
                    cb.on_image_error(job, index, total, &e.to_string());
                }
            }
        }

        FetchedImage {
            index,
            url: slot.url.clone(),
            bytes,
        }
    })
    .await;

    let failed = images.iter().filter(|i| i.bytes.is_err()).count();
    if failed > 0 {
        warn!("{}/{} images unavailable; their pages will be skipped", failed, total);
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrimoireConfig;
    use crate::error::AttemptError;
    use crate::output::Face;
    use crate::pipeline::test_support::MockCatalog;
    use std::sync::Arc;
    use std::time::Duration;

    fn slot(url: &str) -> PageSlot {
        PageSlot {
            name: url.into(),
            face: Face::Front,
            url: url.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_exhausts_image_policy() {
        let catalog = MockCatalog::new().failing_image("mock://bad");
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = tokio::time::Instant::now();
        let err = fetch_image(&catalog, &limiter, &RetryPolicy::image_default(), 4, "mock://bad")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FetchError::Exhausted {
                index: 4,
                url: "mock://bad".into(),
                attempts: 3,
                detail: AttemptError::Status(500).to_string(),
            }
        );
        // 1 s + 2 s of backoff
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn results_stay_at_their_slot_index() {
        // Earlier slots are slower, so completion order is the reverse of slot order.
        let catalog = MockCatalog::new()
            .image_delay("mock://0", Duration::from_millis(900))
            .image_delay("mock://1", Duration::from_millis(500))
            .failing_image("mock://2");
        let pipeline = Pipeline::new(GrimoireConfig::default(), Arc::new(catalog));
        let slots: Vec<PageSlot> = (0..4).map(|i| slot(&format!("mock://{i}"))).collect();

        let images = fetch_all(&pipeline, JobId::new(), &slots).await;

        assert_eq!(images.len(), 4);
        for (i, image) in images.iter().enumerate() {
            assert_eq!(image.index, i);
            assert_eq!(image.url, format!("mock://{i}"));
        }
        assert!(images[0].bytes.is_ok());
        assert!(images[1].bytes.is_ok());
        assert!(images[2].bytes.is_err());
        assert!(images[3].bytes.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn no_slots_no_requests() {
        let catalog = Arc::new(MockCatalog::new());
        let pipeline = Pipeline::new(GrimoireConfig::default(), catalog.clone());
        assert!(fetch_all(&pipeline, JobId::new(), &[]).await.is_empty());
        assert_eq!(catalog.image_requests(), 0);
    }
}
