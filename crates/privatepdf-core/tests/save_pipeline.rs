//! Draggable metadata through overlap, projection and save, checked against
//! the re-parsed output

mod common;

use common::*;
use lopdf::{Document, Object};
use pretty_assertions::assert_eq;
use privatepdf_core::{
    DocumentContext, EditorConfig, EditorSession, FormInputValues, ImageDraggableMetadata, LopdfViewer,
    PageViewRect, ScreenBox, TextDraggableMetadata,
};
use privatepdf_core::pdf::LopdfDocumentHandle;
use std::rc::Rc;

const BASELINE: f64 = 0.8;

fn baseline(_: &str, _: f64) -> f64 {
    BASELINE
}

fn session() -> EditorSession<LopdfViewer> {
    init_tracing();
    EditorSession::new(LopdfViewer, EditorConfig::default())
}

/// Load every page and fix the scale ratio from page 1, like the initial
/// render pass does
async fn render_all(context: &DocumentContext<LopdfDocumentHandle>, rendered_height: f64) {
    for page_number in 1..=context.page_count() {
        let page = context.load_page(page_number).await.unwrap();
        context.record_rendered_height(&page, rendered_height);
    }
}

fn text_draggable(text: &str, left: f64, top: f64) -> TextDraggableMetadata {
    TextDraggableMetadata {
        text: text.to_string(),
        font_family: "Courier".to_string(),
        font_size: 16.0,
        color: "rgb(255, 0, 0)".to_string(),
        text_input_offset_height: 16.0,
        offset_to_ancestor: [left, top],
        bounds: ScreenBox::from_rect(left, top, 100.0, 16.0),
    }
}

fn operand_floats(operands: &[Object]) -> Vec<f64> {
    operands.iter().map(|o| o.as_float().unwrap() as f64).collect()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-3, "{:?} != {:?}", actual, expected);
    }
}

#[tokio::test]
async fn text_overlay_lands_at_projected_baseline() {
    let mut session = session();
    let context = session.load(letter_pdf(1)).await.unwrap();
    render_all(&context, 792.0).await;

    let rects = [PageViewRect::new(0.0, 0.0, 612.0, 792.0)];
    let overlays = context.extract_overlays(&[text_draggable("Hello", 10.0, 20.0)], &[], &rects, &baseline);

    let p1 = 0.5 * BASELINE * 16.0 * (1.0 + 1.0) / 1.0;
    let p2 = p1 + 792.0 - (20.0 + 16.0 - 0.0);
    let expected_y = p2 + p2 / 792.0;
    let expected_x = 10.0 + 10.0 / 612.0;
    let text = &overlays.get(1).unwrap().text_overlays[0];
    assert_close(&[text.transform.x, text.transform.y], &[expected_x, expected_y]);

    let saved = context.save(&FormInputValues::new(), &overlays, 0).await.unwrap();
    let doc = Document::load_mem(&saved).unwrap();
    let ops = overlay_operations(&doc, 1);

    let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
    assert_close(&operand_floats(&tm.operands), &[1.0, 0.0, 0.0, 1.0, expected_x, expected_y]);
    let rg = ops.iter().find(|op| op.operator == "rg").unwrap();
    assert_close(&operand_floats(&rg.operands), &[1.0, 0.0, 0.0]);
    let tj = ops.iter().find(|op| op.operator == "Tj").unwrap();
    assert_eq!(tj.operands[0].as_str().unwrap(), b"Hello");
}

#[tokio::test]
async fn text_on_rotated_page_is_reprojected() {
    let mut session = session();
    let context = session.load(rotated_letter_pdf(1, 90)).await.unwrap();
    // Displayed page is landscape: 792 wide, 612 high
    render_all(&context, 612.0).await;

    let rects = [PageViewRect::new(0.0, 0.0, 792.0, 612.0)];
    let overlays = context.extract_overlays(&[text_draggable("Turned", 10.0, 20.0)], &[], &rects, &baseline);

    let p1 = 0.5 * BASELINE * 16.0 * 2.0;
    let p2 = p1 + 612.0 - (20.0 + 16.0);
    let y = p2 + p2 / 612.0;
    let x = 10.0 + 10.0 / 792.0;

    let saved = context.save(&FormInputValues::new(), &overlays, 0).await.unwrap();
    let doc = Document::load_mem(&saved).unwrap();
    let ops = overlay_operations(&doc, 1);
    let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
    assert_close(&operand_floats(&tm.operands), &[0.0, 1.0, -1.0, 0.0, 612.0 - y, x]);
}

#[tokio::test]
async fn image_spanning_pages_is_embedded_once() {
    let mut session = session();
    let context = session.load(letter_pdf(2)).await.unwrap();
    render_all(&context, 792.0).await;

    let rects = [
        PageViewRect::new(0.0, 0.0, 612.0, 792.0),
        PageViewRect::new(0.0, 802.0, 612.0, 792.0),
    ];
    let image = ImageDraggableMetadata {
        image_base64: png_data_url(4, 4),
        scaled_size: [100.0, 80.0],
        offset_to_ancestor: [50.0, 760.0],
        bounds: ScreenBox::from_rect(50.0, 760.0, 100.0, 80.0),
    };
    let overlays = context.extract_overlays(&[], &[image], &rects, &baseline);
    assert_eq!(overlays.pages_overlays.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    // (792 - 760 + 802) - 80
    assert_eq!(overlays.get(2).unwrap().image_overlays[0].transform.y, 754.0);

    let saved = context.save(&FormInputValues::new(), &overlays, 0).await.unwrap();
    let doc = Document::load_mem(&saved).unwrap();
    assert_eq!(image_xobject_count(&doc), 1);
    for page_number in [1, 2] {
        let ops = overlay_operations(&doc, page_number);
        assert_eq!(ops.iter().filter(|op| op.operator == "Do").count(), 1);
    }
}

#[tokio::test]
async fn broken_image_does_not_abort_save() {
    let mut session = session();
    let context = session.load(letter_pdf(1)).await.unwrap();
    render_all(&context, 792.0).await;

    let rects = [PageViewRect::new(0.0, 0.0, 612.0, 792.0)];
    let image = ImageDraggableMetadata {
        image_base64: "data:image/png;base64,AAAA".to_string(),
        scaled_size: [10.0, 10.0],
        offset_to_ancestor: [300.0, 300.0],
        bounds: ScreenBox::from_rect(300.0, 300.0, 10.0, 10.0),
    };
    let overlays = context.extract_overlays(&[text_draggable("kept", 10.0, 20.0)], &[image], &rects, &baseline);

    let saved = context.save(&FormInputValues::new(), &overlays, 0).await.unwrap();
    let doc = Document::load_mem(&saved).unwrap();
    let ops = overlay_operations(&doc, 1);
    assert!(ops.iter().any(|op| op.operator == "Tj"));
    assert!(!ops.iter().any(|op| op.operator == "Do"));
    assert_eq!(image_xobject_count(&doc), 0);
}

#[tokio::test]
async fn missing_field_does_not_block_valid_one() {
    let mut session = session();
    let context = session.load(form_pdf()).await.unwrap();

    let mut form = FormInputValues::new();
    form.text_name_to_value.insert("email".to_string(), "nobody@example.com".to_string());
    form.text_name_to_value.insert("name".to_string(), "Ada".to_string());
    form.dropdown_name_to_selected_index.insert("name".to_string(), 0);

    let saved = context.save(&form, &Default::default(), 0).await.unwrap();
    let doc = Document::load_mem(&saved).unwrap();
    let acroform = doc
        .catalog()
        .unwrap()
        .get(b"AcroForm")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .unwrap();
    assert!(acroform.get(b"NeedAppearances").unwrap().as_bool().unwrap());

    let field_id = acroform.get(b"Fields").unwrap().as_array().unwrap()[0]
        .as_reference()
        .unwrap();
    let field = doc.get_dictionary(field_id).unwrap();
    assert_eq!(field.get(b"V").unwrap().as_str().unwrap(), b"Ada");
}

#[tokio::test]
async fn rotation_round_trips_through_reload() {
    let mut session = session();
    let original = session.load(letter_pdf(2)).await.unwrap();
    let original_id = original.id();

    let clockwise = original
        .save(&FormInputValues::new(), &Default::default(), 90)
        .await
        .unwrap();
    let rotated = session.load(clockwise).await.unwrap();
    assert!(session.context_if_current(original_id).is_none());
    for page_number in 1..=2 {
        assert_eq!(rotated.load_page(page_number).await.unwrap().rotation(), 90);
    }

    let mut current: Rc<DocumentContext<_>> = rotated;
    for expected in [0, 270] {
        let bytes = current
            .save(&FormInputValues::new(), &Default::default(), -90)
            .await
            .unwrap();
        current = session.load(bytes).await.unwrap();
        assert_eq!(current.load_page(2).await.unwrap().rotation(), expected);
    }
}

#[tokio::test]
async fn unreadable_bytes_fail_to_load() {
    let mut session = session();
    assert!(session.load(b"%PDF-1.7\n%%EOF".to_vec()).await.is_err());
    assert!(session.current().is_none());
}
