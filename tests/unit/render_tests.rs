/*!
 * Tests for overlap resolution and the XLIFF inline writer
 */

use codedtext::model::{AnnotationKind, CTag, Fragment, Metadata, Store, TagType};
use codedtext::render::{FragmentObject, Renderer, SpanForm, XliffWriter};
use crate::common;

/// Crossing code spans render with the later span split
#[test]
fn test_renderer_crossingCodes_shouldSplitLaterSpan() {
    let mut store = Store::new();
    let frag = common::crossing_fragment(&mut store);
    let renderer = Renderer::new(&frag, &store).unwrap();

    assert_eq!(renderer.split_count(), 1);
    let forms: Vec<(String, SpanForm)> = renderer
        .iter()
        .filter_map(FragmentObject::event)
        .map(|e| (e.id().to_string(), e.form))
        .collect();
    assert_eq!(
        forms,
        vec![
            ("1".to_string(), SpanForm::Nested),
            ("2".to_string(), SpanForm::Split),
            ("1".to_string(), SpanForm::Nested),
            ("2".to_string(), SpanForm::Split),
        ]
    );
    assert_eq!(renderer.plain_text(), "abc");
}

/// A closing code without its opening in the fragment is isolated
#[test]
fn test_renderer_closingOnly_shouldBeIsolated() {
    let mut store = Store::new();
    let mut tail = Fragment::source();
    tail.append("x");
    let closing = CTag::new(TagType::Closing, "9", Some("</span>"));
    tail.append_tag(&mut store, closing.into()).unwrap();

    let renderer = Renderer::new(&tail, &store).unwrap();
    match &renderer.objects()[1] {
        FragmentObject::Closing(e) => assert_eq!(e.form, SpanForm::Isolated),
        other => panic!("unexpected object {:?}", other),
    }
    let out = XliffWriter::new().render_fragment(&tail, &store).unwrap();
    assert_eq!(out, "x<ec id=\"9\" isolated=\"yes\"/>");
}

/// Protected content stays opaque in the renderer but is written expanded
#[test]
fn test_renderer_protectedContent_shouldBeOpaqueUnlessExpanded() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);
    let expected = XliffWriter::new().render_fragment(&frag, &store).unwrap();
    frag.protect(&mut store, 6, 14).unwrap();

    let renderer = Renderer::new(&frag, &store).unwrap();
    assert!(renderer.iter().any(|o| matches!(o, FragmentObject::Protected { .. })));
    let expanded = Renderer::with_protected_content(&frag, &store).unwrap();
    assert!(!expanded.iter().any(|o| matches!(o, FragmentObject::Protected { .. })));

    assert_eq!(XliffWriter::new().render_fragment(&frag, &store).unwrap(), expected);
}

/// Text is escaped and annotations become mrk elements
#[test]
fn test_xliffWriter_annotationAndEscaping_shouldWriteMrk() {
    let mut store = Store::new();
    let mut frag = Fragment::source();
    frag.append("a<b & c");
    frag.annotate(
        &mut store,
        0,
        Some(1),
        AnnotationKind::Comment,
        Some(Metadata::Comment {
            text: Some("say \"hi\"".to_string()),
            note_ref: None,
        }),
    )
    .unwrap();

    let out = XliffWriter::new().render_fragment(&frag, &store).unwrap();
    assert_eq!(
        out,
        "<mrk id=\"1\" type=\"comment\" value=\"say &quot;hi&quot;\">a</mrk>&lt;b &amp; c"
    );
}

/// Without original data no dataRef attribute is written
#[test]
fn test_xliffWriter_withoutOriginalData_shouldOmitDataRefs() {
    let mut store = Store::new();
    let frag = common::bold_fragment(&mut store);
    let out = XliffWriter::new().with_original_data(false).render_fragment(&frag, &store).unwrap();
    assert_eq!(out, "Hello <pc id=\"1\">bold</pc> world<ph id=\"2\"/>");
    let with_data = XliffWriter::new().with_original_data(true).render_fragment(&frag, &store).unwrap();
    assert_eq!(
        with_data,
        "Hello <pc id=\"1\" dataRefStart=\"d1\" dataRefEnd=\"d2\">bold</pc> world<ph id=\"2\" dataRef=\"d3\"/>"
    );
}
