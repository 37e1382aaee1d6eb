//! Bake form edits, overlays and page rotation into a new PDF
//!
//! Only reopening the source bytes and the final serialization can fail a
//! save. Everything in between (one form field, one image, one overlay) is
//! applied best-effort: failures are logged and the next item is processed.

use std::collections::HashMap;
use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::coords::normalize_rotation;
use crate::engine::EditableDocument;
use crate::error::{FieldError, ImageError, PrivatePdfError};
use crate::fonts::StandardFont;
use crate::forms::{ChoiceKind, FormInputValues};
use crate::overlays::{decode_image_payload, ImageOverlay, ImageType, OverlayRef, Overlays};

/// Fonts embedded for one save, looked up by overlay font family
pub struct EmbeddedFonts<F> {
    by_font: HashMap<StandardFont, F>,
    fallback: F,
}

impl<F> EmbeddedFonts<F> {
    /// Exact standard font name, or the fallback
    pub fn font_for(&self, font_family: &str) -> &F {
        StandardFont::from_name(font_family)
            .and_then(|font| self.by_font.get(&font))
            .unwrap_or(&self.fallback)
    }
}

/// Images embedded for one save, keyed by raw payload
pub struct EmbeddedImages<'a, I> {
    by_payload: HashMap<&'a str, I>,
}

impl<'a, I> EmbeddedImages<'a, I> {
    pub fn get(&self, payload: &str) -> Option<&I> {
        self.by_payload.get(payload)
    }
}

/// Composites edits onto the bytes of the currently open document using the
/// editing engine `E`
pub struct PdfDocumentSaver<'a, E> {
    source: &'a [u8],
    _engine: PhantomData<E>,
}

impl<'a, E: EditableDocument> PdfDocumentSaver<'a, E> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            _engine: PhantomData,
        }
    }

    pub fn save(
        &self,
        form_values: &FormInputValues,
        overlays: &Overlays,
        rotate_by: i32,
    ) -> Result<Vec<u8>, PrivatePdfError> {
        let mut doc = E::load(self.source)?;

        apply_form_values(&mut doc, form_values);
        let fonts = embed_fonts(&mut doc, overlays);
        let images = embed_images(&mut doc, overlays);
        draw_overlays(&mut doc, overlays, &fonts, &images);
        rotate_pages(&mut doc, rotate_by);

        doc.save()
    }
}

/// Apply every pending form edit, isolating failures per field
pub fn apply_form_values<E: EditableDocument>(doc: &mut E, form_values: &FormInputValues) {
    for (name, value) in &form_values.text_name_to_value {
        if let Err(e) = doc.set_text(name, value) {
            warn!(field = %name, error = %e, "skipping text field");
        }
    }

    for (name, &checked) in &form_values.checkbox_name_to_value {
        if let Err(e) = doc.set_checked(name, checked) {
            warn!(field = %name, error = %e, "skipping checkbox");
        }
    }

    for (kind, selections) in form_values.choice_edits() {
        for (name, &index) in selections {
            if let Err(e) = select_option_index(doc, name, kind, index) {
                warn!(field = %name, kind = kind.label(), error = %e, "skipping choice field");
            }
        }
    }
}

fn select_option_index<E: EditableDocument>(
    doc: &mut E,
    name: &str,
    kind: ChoiceKind,
    index: i64,
) -> Result<(), FieldError> {
    let options = doc.options(name, kind)?;
    let option = usize::try_from(index)
        .ok()
        .and_then(|i| options.get(i))
        .ok_or_else(|| FieldError::UnknownOption {
            name: name.to_string(),
            option: format!("index {} of {}", index, options.len()),
        })?;
    doc.select(name, kind, option)
}

/// Embed each distinct recognized font once, plus the fallback
pub fn embed_fonts<E: EditableDocument>(doc: &mut E, overlays: &Overlays) -> EmbeddedFonts<E::Font> {
    let mut by_font = HashMap::new();
    for overlay in overlays.text_overlays() {
        if let Some(font) = StandardFont::from_name(&overlay.font_family) {
            by_font
                .entry(font)
                .or_insert_with(|| doc.embed_standard_font(font));
        }
    }

    let fallback = match by_font.get(&StandardFont::FALLBACK) {
        Some(font) => font.clone(),
        None => doc.embed_standard_font(StandardFont::FALLBACK),
    };

    debug!(fonts = by_font.len(), "embedded fonts");
    EmbeddedFonts { by_font, fallback }
}

/// Embed each distinct image payload once
pub fn embed_images<'a, E: EditableDocument>(
    doc: &mut E,
    overlays: &'a Overlays,
) -> EmbeddedImages<'a, E::Image> {
    let mut by_payload = HashMap::new();
    let mut failed = Vec::new();

    for overlay in overlays.image_overlays() {
        let payload = overlay.base64.as_str();
        if by_payload.contains_key(payload) || failed.contains(&payload) {
            continue;
        }
        match embed_image(doc, overlay) {
            Ok(image) => {
                by_payload.insert(payload, image);
            }
            Err(e) => {
                warn!(image_type = ?overlay.image_type, error = %e, "failed to embed image");
                failed.push(payload);
            }
        }
    }

    debug!(images = by_payload.len(), failed = failed.len(), "embedded images");
    EmbeddedImages { by_payload }
}

fn embed_image<E: EditableDocument>(doc: &mut E, overlay: &ImageOverlay) -> Result<E::Image, ImageError> {
    let bytes = decode_image_payload(&overlay.base64)?;
    match overlay.image_type {
        ImageType::Png => doc.embed_png(&bytes),
        ImageType::Jpeg => doc.embed_jpeg(&bytes),
    }
}

/// Draw each page's texts then images, in list order
pub fn draw_overlays<E: EditableDocument>(
    doc: &mut E,
    overlays: &Overlays,
    fonts: &EmbeddedFonts<E::Font>,
    images: &EmbeddedImages<'_, E::Image>,
) {
    for (&page_number, page_overlays) in &overlays.pages_overlays {
        for overlay in page_overlays.draw_order() {
            let drawn = match overlay {
                OverlayRef::Text(text) => {
                    doc.draw_text(page_number, text, fonts.font_for(&text.font_family))
                }
                OverlayRef::Image(image) => match images.get(&image.base64) {
                    Some(embedded) => doc.draw_image(page_number, image, embedded),
                    None => {
                        debug!(page = page_number, "skipping image that failed to embed");
                        Ok(())
                    }
                },
            };
            if let Err(e) = drawn {
                warn!(page = page_number, error = %e, "failed to draw overlay");
            }
        }
    }
}

/// Add `rotate_by` degrees to every page of the document. Every page is
/// rewritten, so out-of-range stored rotations come out normalized even when
/// `rotate_by` is zero.
pub fn rotate_pages<E: EditableDocument>(doc: &mut E, rotate_by: i32) {
    for page_number in 1..=doc.page_count() {
        let rotated = doc.rotation(page_number).and_then(|current| {
            let rotation = normalize_rotation(current as i64 + rotate_by as i64);
            doc.set_rotation(page_number, rotation)
        });
        if let Err(e) = rotated {
            warn!(page = page_number, error = %e, "failed to rotate page");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FormFields;
    use crate::overlays::{Overlay, TextOverlay};
    use base64::Engine;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    /// In-memory editing engine that serializes its own state as JSON
    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct FakeDoc {
        rotations: Vec<i32>,
        text_fields: BTreeMap<String, String>,
        checkboxes: BTreeMap<String, bool>,
        choices: BTreeMap<String, (Vec<String>, Option<String>)>,
        embedded_fonts: Vec<String>,
        embedded_images: Vec<Vec<u8>>,
        drawn: Vec<String>,
    }

    impl FormFields for FakeDoc {
        fn set_text(&mut self, name: &str, value: &str) -> Result<(), FieldError> {
            let field = self
                .text_fields
                .get_mut(name)
                .ok_or_else(|| FieldError::NotFound(name.to_string()))?;
            *field = value.to_string();
            Ok(())
        }

        fn set_checked(&mut self, name: &str, checked: bool) -> Result<(), FieldError> {
            let field = self
                .checkboxes
                .get_mut(name)
                .ok_or_else(|| FieldError::NotFound(name.to_string()))?;
            *field = checked;
            Ok(())
        }

        fn options(&self, name: &str, _kind: ChoiceKind) -> Result<Vec<String>, FieldError> {
            self.choices
                .get(name)
                .map(|(options, _)| options.clone())
                .ok_or_else(|| FieldError::NotFound(name.to_string()))
        }

        fn select(&mut self, name: &str, _kind: ChoiceKind, option: &str) -> Result<(), FieldError> {
            let (_, selected) = self
                .choices
                .get_mut(name)
                .ok_or_else(|| FieldError::NotFound(name.to_string()))?;
            *selected = Some(option.to_string());
            Ok(())
        }
    }

    impl EditableDocument for FakeDoc {
        type Font = String;
        type Image = usize;

        fn load(bytes: &[u8]) -> Result<Self, PrivatePdfError> {
            serde_json::from_slice(bytes).map_err(|e| PrivatePdfError::ParseError(e.to_string()))
        }

        fn page_count(&self) -> u32 {
            self.rotations.len() as u32
        }

        fn embed_standard_font(&mut self, font: StandardFont) -> String {
            self.embedded_fonts.push(font.name().to_string());
            font.name().to_string()
        }

        fn embed_png(&mut self, bytes: &[u8]) -> Result<usize, ImageError> {
            if !bytes.starts_with(b"PNG") {
                return Err(ImageError::Decode("not a png".to_string()));
            }
            self.embedded_images.push(bytes.to_vec());
            Ok(self.embedded_images.len() - 1)
        }

        fn embed_jpeg(&mut self, bytes: &[u8]) -> Result<usize, ImageError> {
            self.embedded_images.push(bytes.to_vec());
            Ok(self.embedded_images.len() - 1)
        }

        fn draw_text(&mut self, page: u32, overlay: &TextOverlay, font: &String) -> Result<(), PrivatePdfError> {
            if page > self.page_count() {
                return Err(PrivatePdfError::PageOutOfRange {
                    page,
                    page_count: self.page_count(),
                });
            }
            self.drawn.push(format!("p{} text {} {}", page, overlay.text, font));
            Ok(())
        }

        fn draw_image(&mut self, page: u32, _overlay: &ImageOverlay, image: &usize) -> Result<(), PrivatePdfError> {
            self.drawn.push(format!("p{} image {}", page, image));
            Ok(())
        }

        fn rotation(&self, page: u32) -> Result<i32, PrivatePdfError> {
            Ok(self.rotations[page as usize - 1])
        }

        fn set_rotation(&mut self, page: u32, degrees: i32) -> Result<(), PrivatePdfError> {
            self.rotations[page as usize - 1] = degrees;
            Ok(())
        }

        fn save(self) -> Result<Vec<u8>, PrivatePdfError> {
            serde_json::to_vec(&self).map_err(|e| PrivatePdfError::SerializationError(e.to_string()))
        }
    }

    fn source(doc: &FakeDoc) -> Vec<u8> {
        serde_json::to_vec(doc).unwrap()
    }

    fn run(doc: &FakeDoc, form: &FormInputValues, overlays: &Overlays, rotate_by: i32) -> FakeDoc {
        let bytes = source(doc);
        let saved = PdfDocumentSaver::<FakeDoc>::new(&bytes)
            .save(form, overlays, rotate_by)
            .unwrap();
        serde_json::from_slice(&saved).unwrap()
    }

    fn two_pages() -> FakeDoc {
        FakeDoc {
            rotations: vec![0, 90],
            ..FakeDoc::default()
        }
    }

    fn text(label: &str, font_family: &str) -> Overlay {
        Overlay::Text(TextOverlay {
            text: label.to_string(),
            font_family: font_family.to_string(),
            ..TextOverlay::default()
        })
    }

    fn image(payload: &[u8], image_type: ImageType) -> Overlay {
        let mime = match image_type {
            ImageType::Png => "png",
            ImageType::Jpeg => "jpeg",
        };
        let base64 = format!(
            "data:image/{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(payload)
        );
        Overlay::Image(ImageOverlay::new(base64, 10.0, 10.0, image_type))
    }

    #[test]
    fn test_missing_field_does_not_block_later_fields() {
        let mut doc = two_pages();
        doc.text_fields.insert("name".to_string(), String::new());
        doc.checkboxes.insert("agree".to_string(), false);

        let mut form = FormInputValues::new();
        form.text_name_to_value.insert("a_renamed_field".to_string(), "x".to_string());
        form.text_name_to_value.insert("name".to_string(), "Ada".to_string());
        form.checkbox_name_to_value.insert("missing".to_string(), true);
        form.checkbox_name_to_value.insert("agree".to_string(), true);

        let saved = run(&doc, &form, &Overlays::new(), 0);
        assert_eq!(saved.text_fields["name"], "Ada");
        assert!(saved.checkboxes["agree"]);
        assert!(!saved.text_fields.contains_key("a_renamed_field"));
    }

    #[test]
    fn test_choice_index_out_of_range_is_skipped() {
        let mut doc = two_pages();
        let options = vec!["red".to_string(), "green".to_string()];
        doc.choices.insert("color".to_string(), (options.clone(), None));
        doc.choices.insert("shade".to_string(), (options.clone(), None));
        doc.choices.insert("size".to_string(), (options, None));

        let mut form = FormInputValues::new();
        form.dropdown_name_to_selected_index.insert("color".to_string(), 1);
        form.option_name_to_selected_index.insert("shade".to_string(), 2);
        form.radio_group_name_to_selected_index.insert("size".to_string(), -1);

        let saved = run(&doc, &form, &Overlays::new(), 0);
        assert_eq!(saved.choices["color"].1.as_deref(), Some("green"));
        assert_eq!(saved.choices["shade"].1, None);
        assert_eq!(saved.choices["size"].1, None);
    }

    #[test]
    fn test_fonts_embedded_once_with_fallback() {
        let mut overlays = Overlays::new();
        overlays.add(1, text("a", "Courier"));
        overlays.add(2, text("b", "Courier"));
        overlays.add(2, text("c", "Comic Sans"));

        let saved = run(&two_pages(), &FormInputValues::new(), &overlays, 0);
        assert_eq!(saved.embedded_fonts, vec!["Courier", "Helvetica"]);
        assert_eq!(
            saved.drawn,
            vec!["p1 text a Courier", "p2 text b Courier", "p2 text c Helvetica"]
        );
    }

    #[test]
    fn test_fallback_font_embedded_even_without_text() {
        let saved = run(&two_pages(), &FormInputValues::new(), &Overlays::new(), 0);
        assert_eq!(saved.embedded_fonts, vec!["Helvetica"]);
    }

    #[test]
    fn test_identical_images_embedded_once() {
        let mut overlays = Overlays::new();
        overlays.add(1, image(b"PNG-logo", ImageType::Png));
        overlays.add(2, image(b"PNG-logo", ImageType::Png));

        let saved = run(&two_pages(), &FormInputValues::new(), &overlays, 0);
        assert_eq!(saved.embedded_images.len(), 1);
        assert_eq!(saved.drawn, vec!["p1 image 0", "p2 image 0"]);
    }

    #[test]
    fn test_failed_image_is_skipped_but_others_drawn() {
        let mut overlays = Overlays::new();
        overlays.add(1, image(b"not really a png", ImageType::Png));
        overlays.add(1, image(b"jpeg-bytes", ImageType::Jpeg));
        overlays.add(1, text("label", "Helvetica"));

        let saved = run(&two_pages(), &FormInputValues::new(), &overlays, 0);
        assert_eq!(saved.embedded_images, vec![b"jpeg-bytes".to_vec()]);
        assert_eq!(saved.drawn, vec!["p1 text label Helvetica", "p1 image 0"]);
    }

    #[test]
    fn test_draw_failure_does_not_abort_save() {
        let mut overlays = Overlays::new();
        overlays.add(5, text("nowhere", "Helvetica"));
        overlays.add(1, text("here", "Helvetica"));

        let saved = run(&two_pages(), &FormInputValues::new(), &overlays, 0);
        assert_eq!(saved.drawn, vec!["p1 text here Helvetica"]);
    }

    #[test]
    fn test_rotation_applies_to_every_page() {
        let doc = FakeDoc {
            rotations: vec![0, 90, 350],
            ..FakeDoc::default()
        };
        let saved = run(&doc, &FormInputValues::new(), &Overlays::new(), -90);
        assert_eq!(saved.rotations, vec![270, 0, 260]);

        let saved = run(&doc, &FormInputValues::new(), &Overlays::new(), 20);
        assert_eq!(saved.rotations, vec![20, 110, 10]);
    }

    #[test]
    fn test_zero_rotation_normalizes_stored_values() {
        let doc = FakeDoc {
            rotations: vec![-90, 450, 180],
            ..FakeDoc::default()
        };
        let saved = run(&doc, &FormInputValues::new(), &Overlays::new(), 0);
        assert_eq!(saved.rotations, vec![270, 90, 180]);
    }

    #[test]
    fn test_unreadable_source_is_fatal() {
        let result = PdfDocumentSaver::<FakeDoc>::new(b"%PDF-garbage").save(
            &FormInputValues::new(),
            &Overlays::new(),
            0,
        );
        assert!(matches!(result, Err(PrivatePdfError::ParseError(_))));
    }

    #[test]
    fn test_embedded_fonts_lookup() {
        let mut doc = two_pages();
        let mut overlays = Overlays::new();
        overlays.add(1, text("a", "Times-Bold"));
        let fonts = embed_fonts(&mut doc, &overlays);
        assert_eq!(fonts.font_for("Times-Bold"), "Times-Bold");
        assert_eq!(fonts.font_for("times-bold"), "Helvetica");
        assert_eq!(doc.embedded_fonts, vec!["Times-Bold", "Helvetica"]);
    }
}
