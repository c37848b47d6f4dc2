//! Shared helpers for the integration tests: an in-memory catalog and PDF
//! inspection.

#![allow(dead_code)]

use async_trait::async_trait;
use grimoire::{AttemptError, CardMetadata, Catalog, Face};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::Document;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([20, 40, 60])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Catalog answering from a fixed card table. Artwork is a PNG whose width
/// is the card's registered `art_width` (+1 for back faces), so tests can
/// tell from the PDF which artwork landed on which page.
#[derive(Default)]
pub struct FakeCatalog {
    cards: HashMap<(String, String), (CardMetadata, u32)>,
    broken_images: HashSet<String>,
    image_delay: Option<Duration>,
    lookups: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_card(mut self, set: &str, number: &str, layout: &str, art_width: u32) -> Self {
        self.cards.insert(
            (set.into(), number.into()),
            (
                CardMetadata {
                    name: format!("{set}-{number}"),
                    layout: layout.into(),
                },
                art_width,
            ),
        );
        self
    }

    /// Every download of this printing's front face fails with HTTP 500.
    pub fn with_broken_image(mut self, set: &str, number: &str) -> Self {
        let url = self.image_url(set, number, Face::Front);
        self.broken_images.insert(url);
        self
    }

    /// Every download takes this long.
    pub fn with_image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = Some(delay);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn card(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> Result<CardMetadata, AttemptError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.cards
            .get(&(set_code.to_string(), collector_number.to_string()))
            .map(|(meta, _)| meta.clone())
            .ok_or(AttemptError::Status(404))
    }

    fn image_url(&self, set_code: &str, collector_number: &str, face: Face) -> String {
        format!("fake://{set_code}/{collector_number}/{face}")
    }

    async fn image(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        if let Some(delay) = self.image_delay {
            tokio::time::sleep(delay).await;
        }
        if self.broken_images.contains(url) {
            return Err(AttemptError::Status(500));
        }
        let mut parts = url.trim_start_matches("fake://").split('/');
        let (set, number, face) = (
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
        );
        let (_, width) = self
            .cards
            .get(&(set.to_string(), number.to_string()))
            .ok_or(AttemptError::Status(404))?;
        let width = if face == "back" { width + 1 } else { *width };
        Ok(png(width, 4))
    }
}

/// Width of the artwork drawn on each page, in page order.
pub fn page_art_widths(pdf: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| {
            let page = doc.get_dictionary(*page_id).unwrap();
            let xobjects = page
                .get(b"Resources")
                .and_then(|r| r.as_dict())
                .and_then(|r| r.get(b"XObject"))
                .and_then(|x| x.as_dict())
                .unwrap();
            let (_, image_ref) = xobjects.iter().next().unwrap();
            let image = doc
                .get_object(image_ref.as_reference().unwrap())
                .and_then(|o| o.as_stream())
                .unwrap();
            image.dict.get(b"Width").and_then(|w| w.as_i64()).unwrap()
        })
        .collect()
}
