//! Viewer-side engine on top of lopdf

use lopdf::Document;
use tracing::debug;

use super::page_info::{get_page_size, get_rotation, page_dictionary};
use crate::config::LoadOptions;
use crate::engine::{DocumentHandle, PageGeometry, PdfViewer};
use crate::error::PrivatePdfError;

/// Opens documents with lopdf. Character map options only matter to
/// engines that render glyphs and are accepted for interface parity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfViewer;

/// A parsed document together with the bytes it was parsed from
pub struct LopdfDocumentHandle {
    doc: Document,
    bytes: Vec<u8>,
}

impl LopdfDocumentHandle {
    pub fn parse(bytes: Vec<u8>) -> Result<Self, PrivatePdfError> {
        let doc = Document::load_mem(&bytes).map_err(|e| PrivatePdfError::ParseError(e.to_string()))?;
        Ok(Self { doc, bytes })
    }
}

impl PdfViewer for LopdfViewer {
    type Document = LopdfDocumentHandle;

    async fn open(
        &self,
        bytes: Vec<u8>,
        options: &LoadOptions,
    ) -> Result<LopdfDocumentHandle, PrivatePdfError> {
        debug!(
            cmap_location = %options.cmap_location,
            cmap_packed = options.cmap_packed,
            exotic_forms = options.enable_exotic_form_support,
            "opening document"
        );
        LopdfDocumentHandle::parse(bytes)
    }
}

impl DocumentHandle for LopdfDocumentHandle {
    fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    async fn page(&self, page_number: u32) -> Result<PageGeometry, PrivatePdfError> {
        let page = page_dictionary(&self.doc, page_number)?;
        let (width, height) = get_page_size(&self.doc, page)?;
        Ok(PageGeometry {
            width,
            height,
            rotation: get_rotation(&self.doc, page),
        })
    }

    /// The viewer never mutates the document, so its current state is the
    /// bytes it was opened from
    async fn serialize_current_state(&self) -> Result<Vec<u8>, PrivatePdfError> {
        Ok(self.bytes.clone())
    }
}
