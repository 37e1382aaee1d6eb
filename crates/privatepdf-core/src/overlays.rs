//! Overlays: text and images placed on top of PDF pages
//!
//! Every overlay carries a [`Transform`] already expressed in PDF space for
//! the page that hosts it. One on-screen annotation that spans a page
//! boundary produces one overlay per overlapped page.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::ImageError;

/// Position and rotation of one overlay instance, in PDF points
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    /// Rotation in degrees; equal to the hosting page's rotation
    pub rotation: i32,
}

impl Transform {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, rotation: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    /// Text size, in points
    pub text_size: f64,
    /// Color whose components range between [0, 1]
    pub text_color: Rgb,
    pub font_family: String,
    pub transform: Transform,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            text: String::new(),
            text_size: 13.0,
            text_color: Rgb::BLACK,
            font_family: "Helvetica".to_string(),
            transform: Transform::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    Png,
    Jpeg,
}

impl ImageType {
    /// Detect the image type from a `data:` URL prefix
    pub fn from_data_url(base64: &str) -> Option<ImageType> {
        if base64.starts_with("data:image/png;") {
            Some(ImageType::Png)
        } else if base64.starts_with("data:image/jpeg;") {
            Some(ImageType::Jpeg)
        } else {
            None
        }
    }
}

/// Decode an image payload that is either a `data:` URL or bare base64
pub fn decode_image_payload(base64: &str) -> Result<Vec<u8>, ImageError> {
    let encoded = match base64.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| ImageError::InvalidBase64("data URL has no payload".to_string()))?,
        None => base64,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ImageError::InvalidBase64(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    /// Raw payload as supplied by the presentation layer (usually a data URL).
    /// Identical payloads are embedded once per saved document.
    pub base64: String,
    pub width: f64,
    pub height: f64,
    pub image_type: ImageType,
    pub transform: Transform,
}

impl ImageOverlay {
    pub fn new(base64: String, width: f64, height: f64, image_type: ImageType) -> Self {
        Self {
            base64,
            width,
            height,
            image_type,
            transform: Transform::default(),
        }
    }
}

/// An owned overlay of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Text(TextOverlay),
    Image(ImageOverlay),
}

/// A borrowed overlay, yielded in drawing order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayRef<'a> {
    Text(&'a TextOverlay),
    Image(&'a ImageOverlay),
}

/// All overlays hosted by one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageOverlays {
    pub text_overlays: Vec<TextOverlay>,
    pub image_overlays: Vec<ImageOverlay>,
}

impl PageOverlays {
    pub fn push(&mut self, overlay: Overlay) {
        match overlay {
            Overlay::Text(text) => self.text_overlays.push(text),
            Overlay::Image(image) => self.image_overlays.push(image),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_overlays.is_empty() && self.image_overlays.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text_overlays.len() + self.image_overlays.len()
    }

    /// Text overlays in list order, then image overlays in list order
    pub fn draw_order(&self) -> impl Iterator<Item = OverlayRef<'_>> {
        self.text_overlays
            .iter()
            .map(OverlayRef::Text)
            .chain(self.image_overlays.iter().map(OverlayRef::Image))
    }
}

/// Overlays of a whole document, keyed by 1-based page number.
/// Only pages hosting at least one overlay have an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlays {
    pub pages_overlays: BTreeMap<u32, PageOverlays>,
}

impl Overlays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, page_number: u32, overlay: Overlay) {
        self.pages_overlays
            .entry(page_number)
            .or_default()
            .push(overlay);
    }

    pub fn get(&self, page_number: u32) -> Option<&PageOverlays> {
        self.pages_overlays.get(&page_number)
    }

    pub fn is_empty(&self) -> bool {
        self.pages_overlays.values().all(PageOverlays::is_empty)
    }

    pub fn text_overlays(&self) -> impl Iterator<Item = &TextOverlay> {
        self.pages_overlays
            .values()
            .flat_map(|page| page.text_overlays.iter())
    }

    pub fn image_overlays(&self) -> impl Iterator<Item = &ImageOverlay> {
        self.pages_overlays
            .values()
            .flat_map(|page| page.image_overlays.iter())
    }
}
