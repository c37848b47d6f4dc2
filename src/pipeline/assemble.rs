//! PDF assembly: fetched artwork → one page per image.
//!
//! ## Why spawn_blocking?
//!
//! Decoding PNG artwork, re-encoding it as JPEG and serialising the document
//! are CPU-bound and can take hundreds of milliseconds for a large deck.
//! Running them on the blocking pool keeps the async workers free to drive
//! other jobs' network I/O.
//!
//! ## Page layout
//!
//! ```text
//! ┌───────────────┐  page = card + bleed on every side,
//! │ ┌───────────┐ │  filled with the bleed colour
//! │ │           │ │
//! │ │  artwork  │ │  artwork stretched into the card box
//! │ │           │ │
//! │ └───────────┘ │
//! └───────────────┘
//! ```

use crate::config::PageLayout;
use crate::error::{FetchError, GrimoireError};
use crate::output::CardDocument;
use crate::pipeline::fetch::FetchedImage;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

const IMAGE_NAME: &str = "Im0";

/// Build the document on the blocking pool.
pub async fn assemble(
    layout: PageLayout,
    images: Vec<FetchedImage>,
) -> Result<CardDocument, GrimoireError> {
    tokio::task::spawn_blocking(move || assemble_blocking(&layout, images))
        .await
        .map_err(|e| GrimoireError::Internal(format!("Assembly task panicked: {}", e)))?
}

/// Blocking implementation of [`assemble`].
///
/// Pages follow the order of `images`. Slots whose download failed, and
/// slots whose bytes are not a decodable raster, are left out and listed in
/// [`CardDocument::missing`].
pub fn assemble_blocking(
    layout: &PageLayout,
    images: Vec<FetchedImage>,
) -> Result<CardDocument, GrimoireError> {
    let mut writer = PageWriter::new(*layout);
    let mut missing = Vec::new();

    for image in images {
        let bytes = match image.bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                missing.push(e);
                continue;
            }
        };
        let jpeg = match to_jpeg(&bytes, layout.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(detail) => {
                warn!(
                    "Image {}: cannot decode artwork, skipping page: {}",
                    image.index, detail
                );
                missing.push(FetchError::Undecodable {
                    index: image.index,
                    url: image.url,
                    detail,
                });
                continue;
            }
        };
        writer.add_page(jpeg)?;
    }

    let pages = writer.page_count();
    let bytes = writer.finish()?;
    info!(
        "Assembled {} pages ({} skipped, {} bytes)",
        pages,
        missing.len(),
        bytes.len()
    );

    Ok(CardDocument {
        bytes,
        pages,
        missing,
    })
}

/// Decoded JPEG ready to embed with `DCTDecode`.
struct Jpeg {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Decode any supported raster, flatten to 8-bit RGB and re-encode as JPEG.
fn to_jpeg(bytes: &[u8], quality: u8) -> Result<Jpeg, String> {
    let decoded = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut data, quality);
    rgb.write_with_encoder(encoder).map_err(|e| e.to_string())?;

    debug!(
        "Re-encoded {}x{} artwork: {} → {} bytes",
        width,
        height,
        bytes.len(),
        data.len()
    );
    Ok(Jpeg {
        width,
        height,
        data,
    })
}

/// Accumulates pages into a lopdf object graph.
struct PageWriter {
    doc: Document,
    layout: PageLayout,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl PageWriter {
    fn new(layout: PageLayout) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            layout,
            pages_id,
            page_ids: Vec::new(),
        }
    }

    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn add_page(&mut self, jpeg: Jpeg) -> Result<(), GrimoireError> {
        let l = &self.layout;
        let (page_w, page_h) = (l.page_width_pt(), l.page_height_pt());
        let (card_x, card_y) = l.card_origin_pt();
        let [r, g, b] = l.bleed_color.map(|c| f32::from(c) / 255.0);

        let image_id = self.doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(jpeg.width),
                    "Height" => i64::from(jpeg.height),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg.data,
            )
            .with_compression(false),
        );

        let content = Content {
            operations: vec![
                // background
                Operation::new("q", vec![]),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new(
                    "re",
                    vec![0.into(), 0.into(), page_w.into(), page_h.into()],
                ),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
                // artwork scaled into the card box
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        l.card_width_pt.into(),
                        0.into(),
                        0.into(),
                        l.card_height_pt.into(),
                        card_x.into(),
                        card_y.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| GrimoireError::Assembly(format!("content stream: {}", e)))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, GrimoireError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        let count = self.page_ids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| GrimoireError::Assembly(e.to_string()))?;
        Ok(out)
    }
}
