//! Editing engine on top of lopdf
//!
//! Overlay drawing operations are buffered per page and written out on save
//! as one extra content stream per page. The page's original content is
//! wrapped in a `q`/`Q` pair first so graphics state it leaves behind cannot
//! leak into the overlays.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use super::images::{attach_soft_mask, jpeg_xobject, png_xobject, ImageXObject};
use super::page_info::{get_rotation, inherited_attribute, page_dictionary, page_id, resolve};
use crate::engine::EditableDocument;
use crate::error::{ImageError, PrivatePdfError};
use crate::fonts::StandardFont;
use crate::overlays::{ImageOverlay, TextOverlay};

/// Line spacing of multi-line text, as a multiple of the text size
const LINE_HEIGHT: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFont {
    id: ObjectId,
    font: StandardFont,
}

impl EmbeddedFont {
    fn resource_name(&self) -> String {
        format!("PPF{}", self.id.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    id: ObjectId,
}

impl EmbeddedImage {
    fn resource_name(&self) -> String {
        format!("PPIm{}", self.id.0)
    }
}

/// Drawing buffered for one page
#[derive(Default)]
struct PageOverlayContent {
    operations: Vec<Operation>,
    fonts: BTreeMap<String, ObjectId>,
    xobjects: BTreeMap<String, ObjectId>,
}

pub struct LopdfEditor {
    pub(super) doc: Document,
    pending: BTreeMap<u32, PageOverlayContent>,
    form_edited: bool,
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Rotation matrix entries (a b c d) for a counter-clockwise turn
fn rotation_matrix(degrees: i32) -> [f64; 4] {
    let (sin, cos) = match degrees.rem_euclid(360) {
        0 => (0.0, 1.0),
        90 => (1.0, 0.0),
        180 => (0.0, -1.0),
        270 => (-1.0, 0.0),
        other => (other as f64).to_radians().sin_cos(),
    };
    [cos, sin, -sin, cos]
}

/// Encode text for a simple font. WinAnsi covers Latin-1 plus a few
/// typographic characters; anything else becomes `?`.
pub fn encode_for_font(text: &str, font: StandardFont) -> Vec<u8> {
    if !font.uses_win_ansi_encoding() {
        return text.chars().map(|c| (c as u32).min(0xFF) as u8).collect();
    }
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '•' => 0x95,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

impl LopdfEditor {
    pub(super) fn mark_form_edited(&mut self) {
        self.form_edited = true;
    }

    fn page_content(&mut self, page_number: u32) -> Result<&mut PageOverlayContent, PrivatePdfError> {
        page_id(&self.doc, page_number)?;
        Ok(self.pending.entry(page_number).or_default())
    }

    fn add_image_xobject(&mut self, xobject: ImageXObject) -> EmbeddedImage {
        let ImageXObject {
            mut image,
            soft_mask,
            width,
            height,
        } = xobject;
        if let Some(mask) = soft_mask {
            let mask_id = self.doc.add_object(mask);
            attach_soft_mask(&mut image, mask_id);
        }
        let id = self.doc.add_object(image);
        debug!(width, height, ?id, "embedded image");
        EmbeddedImage { id }
    }

    /// Resources the page currently uses, resolved into an owned dictionary
    fn effective_resources(&self, page_number: u32) -> Result<Dictionary, PrivatePdfError> {
        let page = page_dictionary(&self.doc, page_number)?;
        Ok(inherited_attribute(&self.doc, page, b"Resources")
            .and_then(|resources| resources.as_dict().ok())
            .cloned()
            .unwrap_or_default())
    }

    fn merged_subdictionary(&self, resources: &Dictionary, key: &[u8], entries: &BTreeMap<String, ObjectId>) -> Dictionary {
        let mut sub = resources
            .get(key)
            .ok()
            .and_then(|sub| resolve(&self.doc, sub).as_dict().ok())
            .cloned()
            .unwrap_or_default();
        for (name, id) in entries {
            sub.set(name.as_bytes(), Object::Reference(*id));
        }
        sub
    }

    fn flush_page(&mut self, page_number: u32, content: PageOverlayContent) -> Result<(), PrivatePdfError> {
        let page_id = page_id(&self.doc, page_number)?;

        let mut resources = self.effective_resources(page_number)?;
        if !content.fonts.is_empty() {
            let fonts = self.merged_subdictionary(&resources, b"Font", &content.fonts);
            resources.set("Font", fonts);
        }
        if !content.xobjects.is_empty() {
            let xobjects = self.merged_subdictionary(&resources, b"XObject", &content.xobjects);
            resources.set("XObject", xobjects);
        }

        let encoded = Content {
            operations: content.operations,
        }
        .encode()
        .map_err(|e| PrivatePdfError::SerializationError(e.to_string()))?;

        let existing = self.doc.get_page_contents(page_id);
        let save_id = self.doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let restore_id = self.doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
        let overlay_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(save_id));
        contents.extend(existing.into_iter().map(Object::Reference));
        contents.push(Object::Reference(restore_id));
        contents.push(Object::Reference(overlay_id));

        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PrivatePdfError::OperationError(e.to_string()))?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", resources);
        Ok(())
    }

    /// Ask viewers to regenerate field appearances from the new values
    fn set_need_appearances(&mut self) -> Result<(), PrivatePdfError> {
        let catalog = self
            .doc
            .catalog()
            .map_err(|e| PrivatePdfError::ParseError(e.to_string()))?;
        let acroform_id = match catalog.get(b"AcroForm") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(_)) => None,
            _ => return Ok(()),
        };

        let acroform = match acroform_id {
            Some(id) => self.doc.get_object_mut(id).and_then(Object::as_dict_mut),
            None => self
                .doc
                .catalog_mut()
                .and_then(|catalog| catalog.get_mut(b"AcroForm"))
                .and_then(Object::as_dict_mut),
        }
        .map_err(|e| PrivatePdfError::OperationError(e.to_string()))?;
        acroform.set("NeedAppearances", true);
        Ok(())
    }
}

impl EditableDocument for LopdfEditor {
    type Font = EmbeddedFont;
    type Image = EmbeddedImage;

    fn load(bytes: &[u8]) -> Result<Self, PrivatePdfError> {
        let doc = Document::load_mem(bytes).map_err(|e| PrivatePdfError::ParseError(e.to_string()))?;
        Ok(Self {
            doc,
            pending: BTreeMap::new(),
            form_edited: false,
        })
    }

    fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    fn embed_standard_font(&mut self, font: StandardFont) -> EmbeddedFont {
        let mut dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.name(),
        };
        if font.uses_win_ansi_encoding() {
            dict.set("Encoding", "WinAnsiEncoding");
        }
        let id = self.doc.add_object(dict);
        debug!(font = font.name(), ?id, "embedded standard font");
        EmbeddedFont { id, font }
    }

    fn embed_png(&mut self, bytes: &[u8]) -> Result<EmbeddedImage, ImageError> {
        let xobject = png_xobject(bytes)?;
        Ok(self.add_image_xobject(xobject))
    }

    fn embed_jpeg(&mut self, bytes: &[u8]) -> Result<EmbeddedImage, ImageError> {
        let xobject = jpeg_xobject(bytes)?;
        Ok(self.add_image_xobject(xobject))
    }

    fn draw_text(
        &mut self,
        page_number: u32,
        overlay: &TextOverlay,
        font: &EmbeddedFont,
    ) -> Result<(), PrivatePdfError> {
        let content = self.page_content(page_number)?;
        let resource = font.resource_name();
        content.fonts.insert(resource.clone(), font.id);

        let size = overlay.text_size;
        let color = overlay.text_color;
        let [a, b, c, d] = rotation_matrix(overlay.transform.rotation);
        let ops = &mut content.operations;

        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![Object::Name(resource.into_bytes()), real(size)]));
        ops.push(Operation::new(
            "rg",
            vec![real(color.red), real(color.green), real(color.blue)],
        ));
        ops.push(Operation::new("TL", vec![real(size * LINE_HEIGHT)]));
        ops.push(Operation::new(
            "Tm",
            vec![
                real(a),
                real(b),
                real(c),
                real(d),
                real(overlay.transform.x),
                real(overlay.transform.y),
            ],
        ));
        for (i, line) in overlay.text.split('\n').enumerate() {
            if i > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            let encoded = encode_for_font(line.trim_end_matches('\r'), font.font);
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encoded, StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
        Ok(())
    }

    fn draw_image(
        &mut self,
        page_number: u32,
        overlay: &ImageOverlay,
        image: &EmbeddedImage,
    ) -> Result<(), PrivatePdfError> {
        let content = self.page_content(page_number)?;
        let resource = image.resource_name();
        content.xobjects.insert(resource.clone(), image.id);

        let [a, b, c, d] = rotation_matrix(overlay.transform.rotation);
        let ops = &mut content.operations;

        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(1.0),
                real(0.0),
                real(0.0),
                real(1.0),
                real(overlay.transform.x),
                real(overlay.transform.y),
            ],
        ));
        ops.push(Operation::new(
            "cm",
            vec![real(a), real(b), real(c), real(d), real(0.0), real(0.0)],
        ));
        ops.push(Operation::new(
            "cm",
            vec![
                real(overlay.width),
                real(0.0),
                real(0.0),
                real(overlay.height),
                real(0.0),
                real(0.0),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(resource.into_bytes())]));
        ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn rotation(&self, page_number: u32) -> Result<i32, PrivatePdfError> {
        let page = page_dictionary(&self.doc, page_number)?;
        Ok(get_rotation(&self.doc, page))
    }

    fn set_rotation(&mut self, page_number: u32, degrees: i32) -> Result<(), PrivatePdfError> {
        let id = page_id(&self.doc, page_number)?;
        self.doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PrivatePdfError::OperationError(e.to_string()))?
            .set("Rotate", degrees as i64);
        Ok(())
    }

    fn save(mut self) -> Result<Vec<u8>, PrivatePdfError> {
        let pending = std::mem::take(&mut self.pending);
        for (page_number, content) in pending {
            if let Err(e) = self.flush_page(page_number, content) {
                warn!(page = page_number, error = %e, "dropping overlays of page");
            }
        }
        if self.form_edited {
            if let Err(e) = self.set_need_appearances() {
                warn!(error = %e, "form edited but NeedAppearances could not be set");
            }
        }

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| PrivatePdfError::SerializationError(e.to_string()))?;
        Ok(output)
    }
}
