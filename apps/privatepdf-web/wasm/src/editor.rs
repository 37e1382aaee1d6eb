//! Stateful editor exposed to JavaScript
//!
//! `EditorHandle` carries the logic and stays testable without a browser.
//! `PrivatePdfEditor` is the `wasm_bindgen` face of it: it only converts
//! between `JsValue`s and Rust values and wraps futures into promises.
//!
//! Every asynchronous call captures the document that was current when it
//! was made. If another document was opened in the meantime the call fails
//! with [`STALE_DOCUMENT`] instead of touching the new one.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use privatepdf_core::pdf::LopdfDocumentHandle;
use privatepdf_core::{
    has_pending_changes, BaselineRatio, DocumentContext, EditorConfig, EditorSession,
    FormInputValues, ImageDraggableMetadata, LopdfViewer, Overlays, PageViewRect, PdfDocument,
    PdfPage, TextDraggableMetadata, ThumbnailSize,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

pub const STALE_DOCUMENT: &str = "Document was replaced before the operation finished";
const NO_DOCUMENT: &str = "No document loaded";

/// Used when the page's baseline callback fails or returns nonsense
const FALLBACK_BASELINE_RATIO: f64 = 0.8;

type Context = Rc<DocumentContext<LopdfDocumentHandle>>;

/// Everything the page hands over when overlays are collected for a save
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveRequest {
    pub form_values: FormInputValues,
    pub texts: Vec<TextDraggableMetadata>,
    pub images: Vec<ImageDraggableMetadata>,
    /// On-screen rectangle of each rendered page, page 1 first
    pub page_rects: Vec<PageViewRect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub document_id: u64,
    pub page_count: u32,
}

impl DocumentSummary {
    fn of(context: &Context) -> Self {
        Self {
            document_id: context.id().value(),
            page_count: context.page_count(),
        }
    }
}

/// Font settings for a text widget the user is about to insert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDefaults {
    pub font_family: String,
    pub text_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub page_number: u32,
    pub rotation: i32,
    pub width: f64,
    pub height: f64,
    /// Size as displayed, with width and height swapped for quarter turns
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl From<&PdfPage> for PageSummary {
    fn from(page: &PdfPage) -> Self {
        let (width, height) = page.size();
        let (viewport_width, viewport_height) = page.viewport_size();
        Self {
            page_number: page.page_number(),
            rotation: page.rotation(),
            width,
            height,
            viewport_width,
            viewport_height,
        }
    }
}

/// Shared, single-threaded access to the editor session
#[derive(Clone)]
pub struct EditorHandle {
    session: Rc<RefCell<EditorSession<LopdfViewer>>>,
}

impl EditorHandle {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            session: Rc::new(RefCell::new(EditorSession::new(LopdfViewer, config))),
        }
    }

    fn context(&self) -> Result<Context, String> {
        self.session
            .borrow()
            .current()
            .cloned()
            .ok_or_else(|| NO_DOCUMENT.to_string())
    }

    fn ensure_current(&self, context: &Context) -> Result<(), String> {
        match self.session.borrow().context_if_current(context.id()) {
            Some(_) => Ok(()),
            None => Err(STALE_DOCUMENT.to_string()),
        }
    }

    /// Open `bytes` as the new current document
    pub async fn open(&self, bytes: Vec<u8>) -> Result<DocumentSummary, String> {
        // No borrow may live across the await below
        let (id, viewer, options) = {
            let mut session = self.session.borrow_mut();
            let id = session.begin_load();
            (id, *session.viewer(), session.config().load.clone())
        };
        let document = PdfDocument::open(&viewer, bytes, &options)
            .await
            .map_err(|e| e.to_string())?;
        let context = self
            .session
            .borrow_mut()
            .install(id, document)
            .ok_or_else(|| STALE_DOCUMENT.to_string())?;
        Ok(DocumentSummary::of(&context))
    }

    pub fn page_count(&self) -> u32 {
        self.context().map(|c| c.page_count()).unwrap_or(0)
    }

    /// Decode one page of the current document. The document is captured
    /// now, not when the future is first polled.
    pub fn load_page(&self, page_number: u32) -> impl Future<Output = Result<PageSummary, String>> + 'static {
        let handle = self.clone();
        let context = self.context();
        async move {
            let context = context?;
            let page = context
                .load_page(page_number)
                .await
                .map_err(|e| e.to_string())?;
            handle.ensure_current(&context)?;
            Ok(PageSummary::from(page.as_ref()))
        }
    }

    pub fn cached_page(&self, page_number: u32) -> Option<PageSummary> {
        let context = self.context().ok()?;
        let page = context.document().cached_page(page_number)?;
        Some(PageSummary::from(page.as_ref()))
    }

    /// Report the on-screen height of a rendered page. Returns the document
    /// scale ratio once one is known.
    pub fn record_rendered_height(&self, page_number: u32, rendered_height: f64) -> Result<Option<f64>, String> {
        let context = self.context()?;
        let page = context
            .document()
            .cached_page(page_number)
            .ok_or_else(|| format!("Page {} has not been loaded", page_number))?;
        Ok(context
            .record_rendered_height(&page, rendered_height)
            .map(|ratio| ratio.value()))
    }

    pub fn thumbnail_size(&self, page_number: u32) -> Result<ThumbnailSize, String> {
        let context = self.context()?;
        let page = context
            .document()
            .cached_page(page_number)
            .ok_or_else(|| format!("Page {} has not been loaded", page_number))?;
        let max_size = self.session.borrow().config().thumbnail_max_size;
        Ok(page.thumbnail_size(max_size))
    }

    pub fn text_defaults(&self) -> TextDefaults {
        let session = self.session.borrow();
        let config = session.config();
        TextDefaults {
            font_family: config.default_font_family.clone(),
            text_size: config.default_text_size,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.context().map(|c| c.current_page()).unwrap_or(0)
    }

    pub fn goto_page(&self, page_number: u32) -> Result<u32, String> {
        Ok(self.context()?.goto_page(page_number))
    }

    pub fn next_page(&self) -> Result<u32, String> {
        Ok(self.context()?.next_page())
    }

    pub fn previous_page(&self) -> Result<u32, String> {
        Ok(self.context()?.previous_page())
    }

    pub fn parse_page_input(&self, input: &str) -> Option<u32> {
        self.context().ok()?.parse_page_input(input)
    }

    pub fn extract_overlays(&self, request: &SaveRequest, baseline: &dyn BaselineRatio) -> Result<Overlays, String> {
        let context = self.context()?;
        Ok(context.extract_overlays(&request.texts, &request.images, &request.page_rects, baseline))
    }

    /// Whether replacing the current document would lose edits
    pub fn has_pending_changes(&self, request: &SaveRequest, baseline: &dyn BaselineRatio) -> bool {
        match self.extract_overlays(request, baseline) {
            Ok(overlays) => has_pending_changes(&overlays, &request.form_values),
            Err(_) => false,
        }
    }

    /// Composite form values, overlays and rotation into new bytes
    pub fn save(
        &self,
        form_values: FormInputValues,
        overlays: Overlays,
        rotate_by: i32,
    ) -> impl Future<Output = Result<Vec<u8>, String>> + 'static {
        let handle = self.clone();
        let context = self.context();
        async move {
            let context = context?;
            let bytes = context
                .save(&form_values, &overlays, rotate_by)
                .await
                .map_err(|e| e.to_string())?;
            handle.ensure_current(&context)?;
            Ok(bytes)
        }
    }

    /// Save with a quarter turn and reopen the result as the current document
    pub fn rotate(
        &self,
        form_values: FormInputValues,
        overlays: Overlays,
        clockwise: bool,
    ) -> impl Future<Output = Result<DocumentSummary, String>> + 'static {
        let handle = self.clone();
        let rotate_by = if clockwise { 90 } else { -90 };
        let saved = self.save(form_values, overlays, rotate_by);
        async move {
            let bytes = saved.await?;
            handle.open(bytes).await
        }
    }
}

/// Wrap the page's `baselineRatio(fontFamily, fontSizePx)` callback
fn js_baseline(callback: &js_sys::Function) -> impl Fn(&str, f64) -> f64 + '_ {
    move |font_family: &str, font_size_px: f64| {
        callback
            .call2(
                &JsValue::NULL,
                &JsValue::from_str(font_family),
                &JsValue::from_f64(font_size_px),
            )
            .ok()
            .and_then(|ratio| ratio.as_f64())
            .filter(|ratio| *ratio > 0.0 && *ratio < 1.0)
            .unwrap_or(FALLBACK_BASELINE_RATIO)
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn parse_request(request: JsValue) -> Result<SaveRequest, JsValue> {
    serde_wasm_bindgen::from_value(request)
        .map_err(|e| JsValue::from_str(&format!("Invalid save request: {}", e)))
}

fn to_uint8_array(bytes: &[u8]) -> js_sys::Uint8Array {
    let array = js_sys::Uint8Array::new_with_length(bytes.len() as u32);
    array.copy_from(bytes);
    array
}

/// PDF editor session for the browser
#[wasm_bindgen]
pub struct PrivatePdfEditor {
    handle: EditorHandle,
}

#[wasm_bindgen]
impl PrivatePdfEditor {
    /// Create an editor. `config_json` may override any subset of the
    /// editor settings.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<PrivatePdfEditor, JsValue> {
        let config = match config_json {
            Some(json) => EditorConfig::from_json(&json)
                .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))?,
            None => EditorConfig::default(),
        };
        Ok(PrivatePdfEditor {
            handle: EditorHandle::new(config),
        })
    }

    /// Open a PDF. Resolves to `{ documentId, pageCount }`.
    pub fn open(&self, bytes: Vec<u8>) -> js_sys::Promise {
        let handle = self.handle.clone();
        future_to_promise(async move {
            let summary = handle.open(bytes).await.map_err(|e| JsValue::from_str(&e))?;
            to_js(&summary)
        })
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.handle.page_count()
    }

    /// Decode a page. Resolves to its size and rotation.
    #[wasm_bindgen(js_name = loadPage)]
    pub fn load_page(&self, page_number: u32) -> js_sys::Promise {
        let loading = self.handle.load_page(page_number);
        future_to_promise(async move {
            let page = loading.await.map_err(|e| JsValue::from_str(&e))?;
            to_js(&page)
        })
    }

    /// A previously loaded page, or `null`
    #[wasm_bindgen(js_name = getCachedPage)]
    pub fn get_cached_page(&self, page_number: u32) -> Result<JsValue, JsValue> {
        match self.handle.cached_page(page_number) {
            Some(page) => to_js(&page),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = recordRenderedHeight)]
    pub fn record_rendered_height(&self, page_number: u32, rendered_height: f64) -> Result<Option<f64>, JsValue> {
        self.handle
            .record_rendered_height(page_number, rendered_height)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = thumbnailSize)]
    pub fn thumbnail_size(&self, page_number: u32) -> Result<JsValue, JsValue> {
        let size = self
            .handle
            .thumbnail_size(page_number)
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&size)
    }

    #[wasm_bindgen(js_name = textDefaults)]
    pub fn text_defaults(&self) -> Result<JsValue, JsValue> {
        to_js(&self.handle.text_defaults())
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.handle.current_page()
    }

    #[wasm_bindgen(js_name = gotoPage)]
    pub fn goto_page(&self, page_number: u32) -> Result<u32, JsValue> {
        self.handle.goto_page(page_number).map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&self) -> Result<u32, JsValue> {
        self.handle.next_page().map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = previousPage)]
    pub fn previous_page(&self) -> Result<u32, JsValue> {
        self.handle.previous_page().map_err(|e| JsValue::from_str(&e))
    }

    /// Page number typed by the user, if it names an existing page
    #[wasm_bindgen(js_name = parsePageInput)]
    pub fn parse_page_input(&self, input: &str) -> Option<u32> {
        self.handle.parse_page_input(input)
    }

    #[wasm_bindgen(js_name = extractOverlays)]
    pub fn extract_overlays(&self, request: JsValue, baseline: &js_sys::Function) -> Result<JsValue, JsValue> {
        let request = parse_request(request)?;
        let overlays = self
            .handle
            .extract_overlays(&request, &js_baseline(baseline))
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&overlays)
    }

    #[wasm_bindgen(js_name = hasPendingChanges)]
    pub fn has_pending_changes(&self, request: JsValue, baseline: &js_sys::Function) -> Result<bool, JsValue> {
        let request = parse_request(request)?;
        Ok(self.handle.has_pending_changes(&request, &js_baseline(baseline)))
    }

    /// Bake all edits into a new PDF. Resolves to a `Uint8Array`.
    pub fn save(&self, request: JsValue, baseline: &js_sys::Function, rotate_by: i32) -> Result<js_sys::Promise, JsValue> {
        let request = parse_request(request)?;
        let overlays = self
            .handle
            .extract_overlays(&request, &js_baseline(baseline))
            .map_err(|e| JsValue::from_str(&e))?;
        let saving = self.handle.save(request.form_values, overlays, rotate_by);
        Ok(future_to_promise(async move {
            let bytes = saving.await.map_err(|e| JsValue::from_str(&e))?;
            Ok(to_uint8_array(&bytes).into())
        }))
    }

    /// Turn every page a quarter turn and reopen. Resolves to the new
    /// document summary.
    pub fn rotate(&self, request: JsValue, baseline: &js_sys::Function, clockwise: bool) -> Result<js_sys::Promise, JsValue> {
        let request = parse_request(request)?;
        let overlays = self
            .handle
            .extract_overlays(&request, &js_baseline(baseline))
            .map_err(|e| JsValue::from_str(&e))?;
        let rotating = self.handle.rotate(request.form_values, overlays, clockwise);
        Ok(future_to_promise(async move {
            let summary = rotating.await.map_err(|e| JsValue::from_str(&e))?;
            to_js(&summary)
        }))
    }
}
