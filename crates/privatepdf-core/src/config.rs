//! Configuration for opening documents and for the editing session
//!
//! Both structs deserialize from partial JSON objects so the web layer can
//! override only what it needs.

use serde::{Deserialize, Serialize};

/// Options handed to the PDF engine when a byte buffer is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadOptions {
    /// Location of the character map files used for CJK text
    pub cmap_location: String,
    /// Whether the character maps are stored in packed binary form
    pub cmap_packed: bool,
    /// Enables XFA and other non-AcroForm form flavours where supported
    pub enable_exotic_form_support: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cmap_location: "dist/cmaps/".to_string(),
            cmap_packed: true,
            enable_exotic_form_support: true,
        }
    }
}

/// Session-wide editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub load: LoadOptions,
    /// Longest side of a rendered page thumbnail, in pixels
    pub thumbnail_max_size: f64,
    /// Text size given to freshly inserted text overlays
    pub default_text_size: f64,
    /// Font family given to freshly inserted text overlays
    pub default_font_family: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            load: LoadOptions::default(),
            thumbnail_max_size: 96.0,
            default_text_size: 13.0,
            default_font_family: "Helvetica".to_string(),
        }
    }
}

impl EditorConfig {
    /// Parse a (possibly partial) JSON configuration object
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_thumbnail_max_size(mut self, max_size: f64) -> Self {
        self.thumbnail_max_size = max_size;
        self
    }
}
