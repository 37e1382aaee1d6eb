//! The open document and its decoded pages

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::LoadOptions;
use crate::coords::normalize_rotation;
use crate::engine::{DocumentHandle, EditableDocument, PageGeometry, PdfViewer};
use crate::error::PrivatePdfError;
use crate::forms::FormInputValues;
use crate::overlays::Overlays;
use crate::pdf::LopdfEditor;
use crate::saver::PdfDocumentSaver;

/// One decoded page
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    page_number: u32,
    rotation: i32,
    width: f64,
    height: f64,
}

/// Canvas size and render scale for a page thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThumbnailSize {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl PdfPage {
    pub fn new(page_number: u32, geometry: PageGeometry) -> Self {
        Self {
            page_number,
            rotation: normalize_rotation(geometry.rotation as i64),
            width: geometry.width,
            height: geometry.height,
        }
    }

    /// 1-based
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Rotation in `[0, 360)`
    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    /// Un-rotated native (width, height) in points
    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// (width, height) as displayed, i.e. swapped for quarter turns
    pub fn viewport_size(&self) -> (f64, f64) {
        match self.rotation {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    /// Fit the displayed page into a `max_size` square keeping its aspect ratio
    pub fn thumbnail_size(&self, max_size: f64) -> ThumbnailSize {
        let (width, height) = self.viewport_size();
        let (canvas_width, canvas_height) = if width > height {
            (max_size, max_size * height / width)
        } else {
            (max_size * width / height, max_size)
        };
        ThumbnailSize {
            width: canvas_width,
            height: canvas_height,
            scale: (canvas_width / width).min(canvas_height / height),
        }
    }
}

/// A loaded document with its page cache.
///
/// Pages enter the cache through [`PdfDocument::load_page`] only and stay
/// there for the lifetime of the document.
pub struct PdfDocument<H: DocumentHandle> {
    handle: H,
    page_cache: RefCell<HashMap<u32, Rc<PdfPage>>>,
}

impl<H: DocumentHandle> PdfDocument<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle,
            page_cache: RefCell::new(HashMap::new()),
        }
    }

    pub async fn open<V>(viewer: &V, bytes: Vec<u8>, options: &LoadOptions) -> Result<Self, PrivatePdfError>
    where
        V: PdfViewer<Document = H>,
    {
        let size = bytes.len();
        let handle = viewer.open(bytes, options).await?;
        info!(bytes = size, pages = handle.page_count(), "opened document");
        Ok(Self::new(handle))
    }

    pub fn page_count(&self) -> u32 {
        self.handle.page_count()
    }

    /// Decode page `page_number` and cache it. A page already in the cache
    /// is returned as is.
    pub async fn load_page(&self, page_number: u32) -> Result<Rc<PdfPage>, PrivatePdfError> {
        let page_count = self.page_count();
        if page_number < 1 || page_number > page_count {
            return Err(PrivatePdfError::PageOutOfRange {
                page: page_number,
                page_count,
            });
        }

        if let Some(page) = self.page_cache.borrow().get(&page_number) {
            return Ok(Rc::clone(page));
        }

        // No borrow is held across the await
        let geometry = self.handle.page(page_number).await?;
        let decoded = Rc::new(PdfPage::new(page_number, geometry));
        // A concurrent load of the same page may have finished first
        let page = Rc::clone(
            self.page_cache
                .borrow_mut()
                .entry(page_number)
                .or_insert(decoded),
        );
        debug!(page = page_number, rotation = page.rotation(), "loaded page");
        Ok(page)
    }

    /// Cached page, never decodes
    pub fn cached_page(&self, page_number: u32) -> Option<Rc<PdfPage>> {
        let page = self.page_cache.borrow().get(&page_number).cloned();
        if page.is_none() {
            warn!(page = page_number, "page not found in cache");
        }
        page
    }

    /// Composite form values, overlays and a uniform rotation into new bytes
    pub async fn save(
        &self,
        form_values: &FormInputValues,
        overlays: &Overlays,
        rotate_by: i32,
    ) -> Result<Vec<u8>, PrivatePdfError> {
        self.save_with::<LopdfEditor>(form_values, overlays, rotate_by)
            .await
    }

    /// Like [`PdfDocument::save`] with an explicit editing engine
    pub async fn save_with<E: EditableDocument>(
        &self,
        form_values: &FormInputValues,
        overlays: &Overlays,
        rotate_by: i32,
    ) -> Result<Vec<u8>, PrivatePdfError> {
        let bytes = self.handle.serialize_current_state().await?;
        let saved = PdfDocumentSaver::<E>::new(&bytes).save(form_values, overlays, rotate_by)?;
        info!(
            input_bytes = bytes.len(),
            output_bytes = saved.len(),
            rotate_by,
            "saved document"
        );
        Ok(saved)
    }
}
