//! The external card catalog: metadata and artwork lookups.
//!
//! The pipeline only talks to [`Catalog`], so tests substitute an in-memory
//! implementation and production uses [`ScryfallCatalog`]. Implementations
//! classify every failure as an [`AttemptError`] and leave retrying and rate
//! limiting to the caller.

use crate::config::GrimoireConfig;
use crate::error::{AttemptError, GrimoireError};
use crate::output::Face;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Catalog layouts whose cards print on two sides.
const DOUBLE_FACED_LAYOUTS: &[&str] = &["transform", "modal_dfc"];

/// The subset of a catalog card record the pipeline needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CardMetadata {
    #[serde(default)]
    pub name: String,
    /// Layout classification, e.g. `normal`, `transform`, `modal_dfc`.
    #[serde(default)]
    pub layout: String,
}

impl CardMetadata {
    pub fn is_double_faced(&self) -> bool {
        DOUBLE_FACED_LAYOUTS.contains(&self.layout.as_str())
    }
}

/// Metadata-by-identifier and image-by-identifier lookups.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch the card record for one printing.
    async fn card(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> Result<CardMetadata, AttemptError>;

    /// URL of the artwork for one face of one printing.
    fn image_url(&self, set_code: &str, collector_number: &str, face: Face) -> String;

    /// Download raw raster bytes.
    async fn image(&self, url: &str) -> Result<Vec<u8>, AttemptError>;
}

/// [`Catalog`] backed by the Scryfall REST API (or anything shaped like it).
#[derive(Debug, Clone)]
pub struct ScryfallCatalog {
    client: reqwest::Client,
    base: Url,
}

impl ScryfallCatalog {
    pub fn new(config: &GrimoireConfig) -> Result<Self, GrimoireError> {
        let base = Url::parse(&config.catalog_url).map_err(|e| {
            GrimoireError::InvalidConfig(format!(
                "Catalog URL '{}' is invalid: {}",
                config.catalog_url, e
            ))
        })?;
        if base.cannot_be_a_base() {
            return Err(GrimoireError::InvalidConfig(format!(
                "Catalog URL '{}' cannot carry a path",
                config.catalog_url
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| GrimoireError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    /// `{base}/cards/{set}/{number}` with each segment percent-encoded, so
    /// collector numbers like `1/2a` stay one segment.
    fn card_endpoint(&self, set_code: &str, collector_number: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["cards", set_code, collector_number]);
        }
        url
    }
}

#[async_trait]
impl Catalog for ScryfallCatalog {
    async fn card(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> Result<CardMetadata, AttemptError> {
        let url = self.card_endpoint(set_code, collector_number);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        classify(response.status())?;

        response
            .json::<CardMetadata>()
            .await
            .map_err(|e| AttemptError::Transport(format!("invalid card JSON: {}", e)))
    }

    fn image_url(&self, set_code: &str, collector_number: &str, face: Face) -> String {
        let mut url = self.card_endpoint(set_code, collector_number);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "image").append_pair("version", "png");
            if face == Face::Back {
                query.append_pair("face", "back");
            }
        }
        url.into()
    }

    async fn image(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        classify(response.status())?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Map an HTTP status onto the retry taxonomy.
fn classify(status: StatusCode) -> Result<(), AttemptError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(AttemptError::Throttled)
    } else if !status.is_success() {
        Err(AttemptError::Status(status.as_u16()))
    } else {
        Ok(())
    }
}
