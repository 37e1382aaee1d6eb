//! Which rendered pages does a draggable visually cover?

use crate::draggable::{PageViewRect, ScreenBox};

/// Two axis-aligned boxes overlap when a corner of either one lies strictly
/// inside the other. Boxes that only share an edge do not overlap.
///
/// Crossing boxes where neither holds a corner of the other (a thin wide box
/// across a tall narrow one) are reported as disjoint.
pub fn boxes_overlap(a: &ScreenBox, b: &ScreenBox) -> bool {
    a.corners().iter().any(|corner| b.contains_strictly(*corner))
        || b.corners().iter().any(|corner| a.contains_strictly(*corner))
}

/// Ascending 1-based page numbers whose on-screen rectangle overlaps
/// `draggable`. `page_rects[i]` is the rectangle of page `i + 1`; pages beyond
/// `page_count` are ignored.
pub fn pages_overlapping(
    draggable: &ScreenBox,
    page_rects: &[PageViewRect],
    page_count: u32,
) -> Vec<u32> {
    page_rects
        .iter()
        .zip(1..=page_count)
        .filter(|(rect, _)| boxes_overlap(draggable, &rect.screen_box()))
        .map(|(_, page_number)| page_number)
        .collect()
}
