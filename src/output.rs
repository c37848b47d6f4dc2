//! Values that flow out of the pipeline stages.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One printed side of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Front,
    Back,
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Face::Front => "front",
            Face::Back => "back",
        })
    }
}

/// A decklist entry after catalog resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCard {
    pub quantity: u32,
    pub name: String,
    pub set_code: String,
    pub collector_number: String,
    /// Artwork URL per face: one entry (front) for ordinary cards, two
    /// (front, back) for double-faced layouts.
    pub faces: Vec<(Face, String)>,
}

impl ResolvedCard {
    /// Number of pages this entry contributes to a fully successful document.
    pub fn page_count(&self) -> usize {
        (self.quantity as usize).saturating_mul(self.faces.len())
    }
}

/// Pages a fully successful document would have, or `None` if the count
/// does not fit in `usize`.
pub fn total_pages(cards: &[ResolvedCard]) -> Option<usize> {
    cards.iter().try_fold(0usize, |total, card| {
        usize::try_from(card.quantity)
            .ok()?
            .checked_mul(card.faces.len())
            .and_then(|pages| total.checked_add(pages))
    })
}

/// One slot in the flattened `(card, copy, face)` page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSlot {
    pub name: String,
    pub face: Face,
    pub url: String,
}

/// Expand resolved cards into page order: cards in decklist order, then each
/// copy, then each face front-to-back.
///
/// Allocates every slot up front; bound the deck with [`total_pages`] first.
pub fn page_slots(cards: &[ResolvedCard]) -> Vec<PageSlot> {
    let mut slots = Vec::with_capacity(total_pages(cards).unwrap_or(0));
    for card in cards {
        for _ in 0..card.quantity {
            for (face, url) in &card.faces {
                slots.push(PageSlot {
                    name: card.name.clone(),
                    face: *face,
                    url: url.clone(),
                });
            }
        }
    }
    slots
}

/// A finished PDF.
#[derive(Debug, Clone)]
pub struct CardDocument {
    /// Encoded PDF bytes.
    pub bytes: Vec<u8>,
    /// Pages written.
    pub pages: usize,
    /// Slots that were skipped, in page order.
    pub missing: Vec<FetchError>,
}

impl CardDocument {
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}
