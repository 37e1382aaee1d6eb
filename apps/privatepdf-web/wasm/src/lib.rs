//! WASM bindings for the PrivatePDF editor
//!
//! The page renders PDF pages and hosts the draggable text and image
//! widgets. Everything else lives in Rust: page geometry, the scale ratio,
//! projecting widgets onto pages, and compositing the saved document.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { PrivatePdfEditor, validateImage } from './pkg/privatepdf_wasm.js';
//!
//! await init();
//!
//! const editor = new PrivatePdfEditor(JSON.stringify({ thumbnailMaxSize: 120 }));
//! const { pageCount } = await editor.open(bytes);
//! const page = await editor.loadPage(1);
//! editor.recordRenderedHeight(1, canvas.offsetHeight);
//!
//! const request = { formValues, texts, images, pageRects };
//! const saved = await editor.save(request, measureBaselineRatio, 0);
//! downloadBlob(saved, "edited.pdf");
//! ```

pub mod editor;
pub mod logging;

use privatepdf_core::ImageType;
use wasm_bindgen::prelude::*;

pub use editor::{DocumentSummary, EditorHandle, PageSummary, PrivatePdfEditor, SaveRequest, TextDefaults};

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logging::init_console_logging(tracing::Level::INFO);
    tracing::info!("PrivatePDF WASM initialized");
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Check an image the user is about to insert.
/// Returns "png" or "jpeg", or an error for anything else.
#[wasm_bindgen(js_name = validateImage)]
pub fn validate_image(data_url: &str) -> Result<String, JsValue> {
    image_kind(data_url).map_err(|e| JsValue::from_str(&e))
}

fn image_kind(data_url: &str) -> Result<String, String> {
    match privatepdf_core::validate_image_payload(data_url) {
        Ok(ImageType::Png) => Ok("png".to_string()),
        Ok(ImageType::Jpeg) => Ok("jpeg".to_string()),
        Err(e) => Err(e.to_string()),
    }
}
