//! Editor session state
//!
//! An [`EditorSession`] holds at most one open document. Opening a file (or
//! reopening the bytes of a rotated document) creates a fresh
//! [`DocumentContext`] under a new [`DocumentId`] instead of mutating the
//! previous one.
//!
//! Nothing in flight is ever cancelled. Asynchronous work captures the
//! `DocumentId` it started under and asks [`EditorSession::context_if_current`]
//! before touching state; a continuation for a replaced document gets `None`
//! and is dropped.

use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EditorConfig;
use crate::coords::{image_overlay_for_page, text_overlay_for_page, BaselineRatio, ScaleRatio};
use crate::document::{PdfDocument, PdfPage};
use crate::draggable::{ImageDraggableMetadata, PageViewRect, TextDraggableMetadata};
use crate::engine::{DocumentHandle, PdfViewer};
use crate::error::PrivatePdfError;
use crate::forms::FormInputValues;
use crate::overlap::pages_overlapping;
use crate::overlays::{ImageType, Overlay, Overlays};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// `true` when saving would change anything
pub fn has_pending_changes(overlays: &Overlays, form_values: &FormInputValues) -> bool {
    !(overlays.is_empty() && form_values.is_empty())
}

/// Everything that belongs to one open document
pub struct DocumentContext<H: DocumentHandle> {
    id: DocumentId,
    document: PdfDocument<H>,
    scale_ratio: Cell<Option<ScaleRatio>>,
    current_page: Cell<u32>,
}

impl<H: DocumentHandle> DocumentContext<H> {
    fn new(id: DocumentId, document: PdfDocument<H>) -> Self {
        Self {
            id,
            document,
            scale_ratio: Cell::new(None),
            current_page: Cell::new(1),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn document(&self) -> &PdfDocument<H> {
        &self.document
    }

    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    pub async fn load_page(&self, page_number: u32) -> Result<Rc<PdfPage>, PrivatePdfError> {
        self.document.load_page(page_number).await
    }

    pub fn scale_ratio(&self) -> Option<ScaleRatio> {
        self.scale_ratio.get()
    }

    /// Report the on-screen height of a rendered page. The first valid report
    /// fixes the scale ratio for the lifetime of the document.
    pub fn record_rendered_height(&self, page: &PdfPage, rendered_height: f64) -> Option<ScaleRatio> {
        if self.scale_ratio.get().is_none() {
            let (_, native_height) = page.viewport_size();
            if let Some(ratio) = ScaleRatio::from_reference(native_height, rendered_height) {
                debug!(
                    page = page.page_number(),
                    ratio = ratio.value(),
                    "scale ratio fixed"
                );
                self.scale_ratio.set(Some(ratio));
            }
        }
        self.scale_ratio.get()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page.get()
    }

    /// Move to `page_number`, clamped to the document's pages
    pub fn goto_page(&self, page_number: u32) -> u32 {
        let page = page_number.clamp(1, self.page_count().max(1));
        self.current_page.set(page);
        page
    }

    pub fn next_page(&self) -> u32 {
        let current = self.current_page();
        if current < self.page_count() {
            self.current_page.set(current + 1);
        }
        self.current_page()
    }

    pub fn previous_page(&self) -> u32 {
        let current = self.current_page();
        if current > 1 {
            self.current_page.set(current - 1);
        }
        self.current_page()
    }

    /// Page number typed by the user, if it names an existing page
    pub fn parse_page_input(&self, input: &str) -> Option<u32> {
        input
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|page| (1..=self.page_count()).contains(page))
    }

    /// Project every draggable onto each rendered page it overlaps.
    ///
    /// `page_rects[i]` is the on-screen rectangle of page `i + 1`. Pages not
    /// loaded yet contribute nothing.
    pub fn extract_overlays(
        &self,
        texts: &[TextDraggableMetadata],
        images: &[ImageDraggableMetadata],
        page_rects: &[PageViewRect],
        baseline: &dyn BaselineRatio,
    ) -> Overlays {
        let mut overlays = Overlays::new();
        if texts.is_empty() && images.is_empty() {
            return overlays;
        }
        let Some(scale) = self.scale_ratio() else {
            warn!("no page rendered yet, overlays cannot be placed");
            return overlays;
        };
        let page_count = self.page_count();

        for draggable in texts {
            for page_number in pages_overlapping(&draggable.bounds, page_rects, page_count) {
                let Some(page) = self.document.cached_page(page_number) else {
                    continue;
                };
                let rect = &page_rects[page_number as usize - 1];
                let overlay = text_overlay_for_page(draggable, rect, &page, scale, baseline);
                overlays.add(page_number, Overlay::Text(overlay));
            }
        }

        for draggable in images {
            let Some(image_type) = ImageType::from_data_url(&draggable.image_base64) else {
                warn!("skipping image that is neither PNG nor JPEG");
                continue;
            };
            for page_number in pages_overlapping(&draggable.bounds, page_rects, page_count) {
                let Some(page) = self.document.cached_page(page_number) else {
                    continue;
                };
                let rect = &page_rects[page_number as usize - 1];
                let overlay = image_overlay_for_page(draggable, image_type, rect, &page, scale);
                overlays.add(page_number, Overlay::Image(overlay));
            }
        }

        overlays
    }

    pub async fn save(
        &self,
        form_values: &FormInputValues,
        overlays: &Overlays,
        rotate_by: i32,
    ) -> Result<Vec<u8>, PrivatePdfError> {
        self.document.save(form_values, overlays, rotate_by).await
    }
}

/// The editor's long-lived state across documents
pub struct EditorSession<V: PdfViewer> {
    viewer: V,
    config: EditorConfig,
    last_issued: u64,
    current: Option<Rc<DocumentContext<V::Document>>>,
}

impl<V: PdfViewer> EditorSession<V> {
    pub fn new(viewer: V, config: EditorConfig) -> Self {
        Self {
            viewer,
            config,
            last_issued: 0,
            current: None,
        }
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Reserve the id of the next document. Any earlier reservation or open
    /// document becomes stale.
    pub fn begin_load(&mut self) -> DocumentId {
        self.last_issued += 1;
        DocumentId(self.last_issued)
    }

    /// Make `document` the active one if `id` is still the latest reservation
    pub fn install(
        &mut self,
        id: DocumentId,
        document: PdfDocument<V::Document>,
    ) -> Option<Rc<DocumentContext<V::Document>>> {
        if id.0 != self.last_issued {
            debug!(document = id.0, "discarding stale document load");
            return None;
        }
        let context = Rc::new(DocumentContext::new(id, document));
        self.current = Some(Rc::clone(&context));
        Some(context)
    }

    /// Open `bytes` and make them the active document
    pub async fn load(&mut self, bytes: Vec<u8>) -> Result<Rc<DocumentContext<V::Document>>, PrivatePdfError> {
        let id = self.begin_load();
        let document = PdfDocument::open(&self.viewer, bytes, &self.config.load).await?;
        self.install(id, document).ok_or_else(|| {
            PrivatePdfError::OperationError("document was replaced while loading".to_string())
        })
    }

    pub fn current(&self) -> Option<&Rc<DocumentContext<V::Document>>> {
        self.current.as_ref()
    }

    /// The active context, if it is still the one `id` refers to
    pub fn context_if_current(&self, id: DocumentId) -> Option<Rc<DocumentContext<V::Document>>> {
        self.current
            .as_ref()
            .filter(|context| context.id == id && id.0 == self.last_issued)
            .cloned()
    }
}
