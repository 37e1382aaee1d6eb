//! Screen-to-PDF coordinate transforms for overlays
//!
//! Three coordinate systems meet here:
//! - screen space: CSS pixels, origin at the top-left of the content root,
//!   y grows downwards
//! - unrotated PDF space: points, origin at the bottom-left of the page,
//!   y grows upwards
//! - rotated PDF space: the unrotated space re-expressed for a page carrying
//!   a `/Rotate` entry, which is what the drawing primitives write into
//!
//! The text placement formulas carry empirical correction terms for sub-pixel
//! drift between the rendered page and the edit surface. They are kept
//! exactly as measured.

use crate::color::text_color_from_css;
use crate::document::PdfPage;
use crate::draggable::{ImageDraggableMetadata, PageViewRect, TextDraggableMetadata};
use crate::overlays::{ImageOverlay, ImageType, TextOverlay, Transform};

/// Estimates which fraction of a text widget's height lies above the font
/// baseline. Implemented by the presentation layer, which can measure glyphs.
pub trait BaselineRatio {
    fn baseline_ratio(&self, font_family: &str, font_size_px: f64) -> f64;
}

impl<F> BaselineRatio for F
where
    F: Fn(&str, f64) -> f64,
{
    fn baseline_ratio(&self, font_family: &str, font_size_px: f64) -> f64 {
        self(font_family, font_size_px)
    }
}

/// Baseline ratio from two measured glyph boxes of the same font: one
/// rendered at size zero (it collapses onto the baseline) and one rendered at
/// full size.
pub fn baseline_ratio_from_glyph_boxes(
    zero_size_top: f64,
    full_size_top: f64,
    full_size_height: f64,
) -> f64 {
    let baseline_position = zero_size_top - full_size_top;
    1.0 - baseline_position / full_size_height
}

/// Converts on-screen pixels into PDF points for one open document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRatio(f64);

impl ScaleRatio {
    pub fn new(ratio: f64) -> Option<Self> {
        (ratio.is_finite() && ratio > 0.0).then_some(Self(ratio))
    }

    /// Ratio of a reference page's native height to its rendered height
    pub fn from_reference(native_height: f64, rendered_height: f64) -> Option<Self> {
        if rendered_height <= 0.0 {
            return None;
        }
        Self::new(native_height / rendered_height)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Normalize any angle in degrees into `[0, 360)`
pub fn normalize_rotation(degrees: i64) -> i32 {
    ((degrees % 360 + 360) % 360) as i32
}

/// Exact (sin, cos) for quarter turns
fn quarter_turn_sin_cos(rotation: i32) -> (f64, f64) {
    match rotation {
        90 => (1.0, 0.0),
        180 => (0.0, -1.0),
        270 => (-1.0, 0.0),
        _ => (0.0, 1.0),
    }
}

/// Re-express a point computed in unrotated page space in the space the
/// page's rotation draws into. The returned transform carries the page
/// rotation so it can be handed straight to the drawing primitive.
pub fn adjust_to_page_rotation(transform: Transform, page: &PdfPage) -> Transform {
    let rotation = page.rotation();
    let (mut width, mut height) = page.viewport_size();
    if rotation == 90 || rotation == 270 {
        std::mem::swap(&mut width, &mut height);
    }

    let (sin, cos) = quarter_turn_sin_cos(rotation);
    let Transform { x, y, .. } = transform;
    let rotated_x = x * cos - y * sin;
    let rotated_y = x * sin + y * cos;

    let (x, y) = match rotation {
        90 => (rotated_x + width, rotated_y),
        180 => (rotated_x + width, rotated_y + height),
        270 => (rotated_x, rotated_y + height),
        _ => (x, y),
    };

    Transform { x, y, rotation }
}

/// Unrotated placement of an image: (transform, width, height)
pub fn image_placement(
    draggable: &ImageDraggableMetadata,
    page_rect: &PageViewRect,
    scale: ScaleRatio,
) -> (Transform, f64, f64) {
    let ratio = scale.value();
    let width = draggable.scaled_size[0] * ratio;
    let height = draggable.scaled_size[1] * ratio;
    let [offset_left, offset_top] = draggable.offset_to_ancestor;

    let x = offset_left * ratio;
    let y = (page_rect.height - offset_top + page_rect.top) * ratio - height;
    (Transform::new(x, y), width, height)
}

/// Unrotated placement of a text baseline
pub fn text_placement(
    draggable: &TextDraggableMetadata,
    page_rect: &PageViewRect,
    scale: ScaleRatio,
    baseline_ratio: f64,
) -> Transform {
    let ratio = scale.value();
    let [offset_left, offset_top] = draggable.offset_to_ancestor;
    let widget_height = draggable.text_input_offset_height;

    let x = (offset_left + offset_left / page_rect.width) * ratio;

    let p1 = 0.5 * baseline_ratio * widget_height * (ratio + 1.0) / ratio;
    let p2 = p1 + page_rect.height - (offset_top + widget_height - page_rect.top);
    let y = (p2 + p2 / page_rect.height) * ratio;

    Transform::new(x, y)
}

/// Project a text draggable onto one page it overlaps
pub fn text_overlay_for_page(
    draggable: &TextDraggableMetadata,
    page_rect: &PageViewRect,
    page: &PdfPage,
    scale: ScaleRatio,
    baseline: &dyn BaselineRatio,
) -> TextOverlay {
    let ratio = baseline.baseline_ratio(&draggable.font_family, draggable.font_size);
    let transform = text_placement(draggable, page_rect, scale, ratio);

    TextOverlay {
        text: draggable.text.clone(),
        text_size: draggable.font_size * scale.value(),
        text_color: text_color_from_css(&draggable.color),
        font_family: draggable.font_family.clone(),
        transform: adjust_to_page_rotation(transform, page),
    }
}

/// Project an image draggable onto one page it overlaps
pub fn image_overlay_for_page(
    draggable: &ImageDraggableMetadata,
    image_type: ImageType,
    page_rect: &PageViewRect,
    page: &PdfPage,
    scale: ScaleRatio,
) -> ImageOverlay {
    let (transform, width, height) = image_placement(draggable, page_rect, scale);
    let mut overlay = ImageOverlay::new(draggable.image_base64.clone(), width, height, image_type);
    overlay.transform = adjust_to_page_rotation(transform, page);
    overlay
}
