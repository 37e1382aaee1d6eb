//! Seams to the PDF engine
//!
//! The viewer side decodes a byte buffer and answers per-page questions
//! (size, rotation) while the document is on screen. The editing side reopens
//! the bytes as a mutable model, applies form edits, draws overlays and
//! serializes the result. [`crate::pdf`] implements both on top of lopdf.

use crate::config::LoadOptions;
use crate::error::{ImageError, PrivatePdfError};
use crate::fonts::StandardFont;
use crate::forms::FormFields;
use crate::overlays::{ImageOverlay, TextOverlay};

/// Native geometry of one page as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Un-rotated width in points
    pub width: f64,
    /// Un-rotated height in points
    pub height: f64,
    /// `/Rotate` in degrees, as stored
    pub rotation: i32,
}

/// Opens documents for viewing
#[allow(async_fn_in_trait)]
pub trait PdfViewer {
    type Document: DocumentHandle;

    async fn open(
        &self,
        bytes: Vec<u8>,
        options: &LoadOptions,
    ) -> Result<Self::Document, PrivatePdfError>;
}

/// A document opened for viewing
#[allow(async_fn_in_trait)]
pub trait DocumentHandle {
    fn page_count(&self) -> u32;

    /// Decode page `page_number` (1-based, already range checked)
    async fn page(&self, page_number: u32) -> Result<PageGeometry, PrivatePdfError>;

    /// Bytes of the document as currently held by the viewer
    async fn serialize_current_state(&self) -> Result<Vec<u8>, PrivatePdfError>;
}

/// A document reopened for editing. Page numbers are 1-based.
pub trait EditableDocument: FormFields + Sized {
    type Font: Clone;
    type Image: Clone;

    fn load(bytes: &[u8]) -> Result<Self, PrivatePdfError>;

    fn page_count(&self) -> u32;

    fn embed_standard_font(&mut self, font: StandardFont) -> Self::Font;

    fn embed_png(&mut self, bytes: &[u8]) -> Result<Self::Image, ImageError>;

    fn embed_jpeg(&mut self, bytes: &[u8]) -> Result<Self::Image, ImageError>;

    fn draw_text(
        &mut self,
        page_number: u32,
        overlay: &TextOverlay,
        font: &Self::Font,
    ) -> Result<(), PrivatePdfError>;

    /// Draws fully opaque
    fn draw_image(
        &mut self,
        page_number: u32,
        overlay: &ImageOverlay,
        image: &Self::Image,
    ) -> Result<(), PrivatePdfError>;

    fn rotation(&self, page_number: u32) -> Result<i32, PrivatePdfError>;

    fn set_rotation(&mut self, page_number: u32, degrees: i32) -> Result<(), PrivatePdfError>;

    fn save(self) -> Result<Vec<u8>, PrivatePdfError>;
}
