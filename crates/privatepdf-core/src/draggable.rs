//! Screen-space descriptions of user-placed annotations
//!
//! The presentation layer measures each draggable widget once per save and
//! hands the measurements over as plain data. Nothing here knows which
//! page(s) a draggable covers yet; that is resolved by [`crate::overlap`].
//!
//! All measurements are CSS pixels relative to the scrollable content root
//! that hosts both the rendered pages and the draggables.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle given by its top-left and bottom-right corners
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenBox {
    pub top_left: [f64; 2],
    pub bottom_right: [f64; 2],
}

impl ScreenBox {
    pub fn from_rect(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            top_left: [left, top],
            bottom_right: [left + width, top + height],
        }
    }

    pub fn corners(&self) -> [[f64; 2]; 4] {
        let [left, top] = self.top_left;
        let [right, bottom] = self.bottom_right;
        [[left, top], [right, bottom], [left, bottom], [right, top]]
    }

    /// Strict containment: points on an edge are outside
    pub fn contains_strictly(&self, point: [f64; 2]) -> bool {
        point[0] > self.top_left[0]
            && point[0] < self.bottom_right[0]
            && point[1] > self.top_left[1]
            && point[1] < self.bottom_right[1]
    }
}

/// On-screen rectangle of one rendered page (its offset box)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageViewRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PageViewRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn screen_box(&self) -> ScreenBox {
        ScreenBox::from_rect(self.left, self.top, self.width, self.height)
    }
}

/// Data needed to create one `TextOverlay` per overlapped page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDraggableMetadata {
    pub text: String,
    pub font_family: String,
    /// Font size of the edit widget, in pixels
    pub font_size: f64,
    /// Computed CSS color, e.g. `"rgb(0, 0, 0)"`
    pub color: String,
    /// Rendered height of the text input widget
    pub text_input_offset_height: f64,
    /// Offset (left, top) of the widget relative to the content root
    pub offset_to_ancestor: [f64; 2],
    #[serde(flatten)]
    pub bounds: ScreenBox,
}

/// Data needed to create one `ImageOverlay` per overlapped page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDraggableMetadata {
    /// Image payload as a `data:` URL
    pub image_base64: String,
    /// On-screen (width, height) after the user's scaling
    pub scaled_size: [f64; 2],
    pub offset_to_ancestor: [f64; 2],
    #[serde(flatten)]
    pub bounds: ScreenBox,
}
