//! lopdf-backed implementations of the engine seams

pub mod acroform;
pub mod editor;
pub mod images;
pub mod page_info;
pub mod viewer;

pub use editor::{EmbeddedFont, EmbeddedImage, LopdfEditor};
pub use viewer::{LopdfDocumentHandle, LopdfViewer};
