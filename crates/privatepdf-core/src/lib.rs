//! Overlay placement and document compositing for the PrivatePDF editor
//!
//! The browser renders pages and lets the user drop text and images on top
//! of them. This crate turns those on-screen annotations into PDF drawing
//! instructions and bakes them, together with form field edits and page
//! rotation, into a new PDF.
//!
//! Data flows through the modules in this order:
//! - [`draggable`]: screen-space measurements handed over by the web layer
//! - [`overlap`]: which rendered pages each annotation covers
//! - [`coords`]: screen pixels to PDF points, including page rotation
//! - [`overlays`] / [`forms`]: what to write into the document
//! - [`saver`]: applies all of it to a fresh copy of the document
//!
//! [`session`] ties these together per open document. The PDF engine sits
//! behind the traits in [`engine`]; [`pdf`] implements them with lopdf.

pub mod color;
pub mod config;
pub mod coords;
pub mod document;
pub mod draggable;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod forms;
pub mod overlap;
pub mod overlays;
pub mod pdf;
pub mod saver;
pub mod session;

pub use color::{parse_rgb, Rgb};
pub use config::{EditorConfig, LoadOptions};
pub use coords::{baseline_ratio_from_glyph_boxes, BaselineRatio, ScaleRatio};
pub use document::{PdfDocument, PdfPage, ThumbnailSize};
pub use draggable::{ImageDraggableMetadata, PageViewRect, ScreenBox, TextDraggableMetadata};
pub use engine::{DocumentHandle, EditableDocument, PageGeometry, PdfViewer};
pub use error::{FieldError, ImageError, PrivatePdfError};
pub use fonts::StandardFont;
pub use forms::{ChoiceKind, FormFields, FormInputValues};
pub use overlays::{ImageOverlay, ImageType, Overlay, Overlays, PageOverlays, TextOverlay, Transform};
pub use pdf::{LopdfEditor, LopdfViewer};
pub use saver::PdfDocumentSaver;
pub use session::{has_pending_changes, DocumentContext, DocumentId, EditorSession};

/// Check that an inserted image payload is a PNG or JPEG data URL
pub fn validate_image_payload(base64: &str) -> Result<ImageType, ImageError> {
    ImageType::from_data_url(base64).ok_or(ImageError::UnsupportedType)
}
