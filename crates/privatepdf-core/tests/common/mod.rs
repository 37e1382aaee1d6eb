//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Route log output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn build(page_count: usize, rotation: i64, with_form: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    let mut first_page = None;
    for i in 0..page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Rotate" => rotation,
        });
        first_page.get_or_insert(page_id);
        kids.push(page_id.into());
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if with_form {
        let name_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("name"),
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Rect" => vec![72.into(), 600.into(), 272.into(), 620.into()],
            "P" => first_page.unwrap(),
        });
        let acroform_id = doc.add_object(dictionary! {
            "Fields" => vec![name_id.into()],
        });
        doc.catalog_mut().unwrap().set("AcroForm", acroform_id);
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// US Letter pages with a line of text each
pub fn letter_pdf(page_count: usize) -> Vec<u8> {
    build(page_count, 0, false)
}

pub fn rotated_letter_pdf(page_count: usize, rotation: i64) -> Vec<u8> {
    build(page_count, rotation, false)
}

/// One page with a single text field named `name`
pub fn form_pdf() -> Vec<u8> {
    build(1, 0, true)
}

/// Semi-transparent PNG as a data URL
pub fn png_data_url(width: u32, height: u32) -> String {
    let image = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 128]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
    )
}

/// Operations of the content stream the editor appended to `page_number`
pub fn overlay_operations(doc: &Document, page_number: u32) -> Vec<Operation> {
    let page_id = doc.get_pages()[&page_number];
    let overlay_id = *doc.get_page_contents(page_id).last().unwrap();
    let stream = doc.get_object(overlay_id).unwrap().as_stream().unwrap();
    let bytes = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    Content::decode(&bytes).unwrap().operations
}

/// Number of image XObjects in the document, soft masks excluded
pub fn image_xobject_count(doc: &Document) -> usize {
    let soft_masks: Vec<_> = doc
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter_map(|stream| stream.dict.get(b"SMask").ok())
        .filter_map(|mask| mask.as_reference().ok())
        .collect();

    doc.objects
        .iter()
        .filter(|(id, _)| !soft_masks.contains(id))
        .filter_map(|(_, object)| object.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|subtype| subtype == b"Image")
                .unwrap_or(false)
        })
        .count()
}
