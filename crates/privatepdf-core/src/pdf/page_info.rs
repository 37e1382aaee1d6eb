//! Page-level attribute lookup
//!
//! `/MediaBox` and `/Rotate` are inheritable: a page without its own entry
//! takes the value of the nearest ancestor in the page tree that has one.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::coords::normalize_rotation;
use crate::error::PrivatePdfError;

/// Ancestors are followed at most this deep, which also breaks `/Parent` cycles
const MAX_TREE_DEPTH: usize = 32;

/// Look up `key` on the page or the closest ancestor carrying it
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = page_dict;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        let parent_id = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        dict = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

/// Follow a reference to its object, leaving direct objects as they are
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Object id of 1-based page `page_number`
pub fn page_id(doc: &Document, page_number: u32) -> Result<ObjectId, PrivatePdfError> {
    let pages = doc.get_pages();
    pages
        .get(&page_number)
        .copied()
        .ok_or(PrivatePdfError::PageOutOfRange {
            page: page_number,
            page_count: pages.len() as u32,
        })
}

pub fn page_dictionary(doc: &Document, page_number: u32) -> Result<&Dictionary, PrivatePdfError> {
    let id = page_id(doc, page_number)?;
    doc.get_dictionary(id)
        .map_err(|e| PrivatePdfError::ParseError(format!("Page {}: {}", page_number, e)))
}

/// MediaBox of the page, defaulting to US Letter
pub fn get_media_box(doc: &Document, page_dict: &Dictionary) -> Result<[f64; 4], PrivatePdfError> {
    match inherited_attribute(doc, page_dict, b"MediaBox") {
        Some(Object::Array(array)) => parse_box_array(array),
        Some(_) => Err(PrivatePdfError::ParseError(
            "MediaBox is not an array".to_string(),
        )),
        None => Ok([0.0, 0.0, 612.0, 792.0]),
    }
}

/// Parse a box array [x1, y1, x2, y2]
fn parse_box_array(array: &[Object]) -> Result<[f64; 4], PrivatePdfError> {
    if array.len() != 4 {
        return Err(PrivatePdfError::ParseError(
            "MediaBox must have 4 elements".to_string(),
        ));
    }

    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = match obj {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => {
                return Err(PrivatePdfError::ParseError(format!(
                    "MediaBox element {} is not a number",
                    i
                )))
            }
        };
    }

    Ok(result)
}

/// Un-rotated (width, height) in points
pub fn get_page_size(doc: &Document, page_dict: &Dictionary) -> Result<(f64, f64), PrivatePdfError> {
    let [x1, y1, x2, y2] = get_media_box(doc, page_dict)?;
    Ok(((x2 - x1).abs(), (y2 - y1).abs()))
}

/// Rotation of the page, normalized into `[0, 360)`
pub fn get_rotation(doc: &Document, page_dict: &Dictionary) -> i32 {
    inherited_attribute(doc, page_dict, b"Rotate")
        .and_then(|rotate| rotate.as_i64().ok())
        .map(normalize_rotation)
        .unwrap_or(0)
}
