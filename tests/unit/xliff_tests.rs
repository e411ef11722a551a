/*!
 * Tests for reading XLIFF inline markup back into fragments
 */

use codedtext::errors::MarkupError;
use codedtext::model::{AnnotationKind, Metadata, Side, Store};
use codedtext::render::XliffWriter;
use codedtext::xliff::InlineReader;
use crate::common;

fn round_trip(markup: &str) -> String {
    let mut store = Store::new();
    let frag = InlineReader::new().read(markup, &mut store, Side::Source).unwrap();
    XliffWriter::new().render_fragment(&frag, &store).unwrap()
}

/// Writing then reading gives back the same content, crossing spans included
#[test]
fn test_read_renderedCrossingCodes_shouldRebuildSameContent() {
    let mut store = Store::new();
    let frag = common::crossing_fragment(&mut store);
    let markup = XliffWriter::new().with_original_data(true).render_fragment(&frag, &store).unwrap();

    let data_refs = store.data_ids();
    let mut scratch = Store::new();
    let copy = InlineReader::with_data_refs(&data_refs)
        .read(&markup, &mut scratch, Side::Source)
        .unwrap();
    assert!(frag.content_eq(&store, &copy, &scratch).unwrap());
    assert_eq!(copy.display_with_ids(&scratch).unwrap(), "{oc:1}a{oc:2}b{cc:1}c{cc:2}");
}

/// Canonical markup is written back unchanged
#[test]
fn test_read_thenWrite_shouldKeepCanonicalMarkup() {
    for markup in [
        "Hello <pc id=\"1\">bold</pc> world<ph id=\"2\"/>",
        "<mrk id=\"m1\" type=\"term\">word</mrk> and <mrk id=\"m2\" translate=\"no\">code</mrk>",
        "<pc id=\"1\">a<sm id=\"m1\"/>b</pc>c<em startRef=\"m1\"/>",
        "x<ec id=\"9\" isolated=\"yes\"/>",
        "1 &lt; 2 &amp;&amp; 3 &gt; 2",
    ] {
        assert_eq!(round_trip(markup), markup);
    }
}

/// Character references and cp elements become literal chars
#[test]
fn test_read_charReferences_shouldDecode() {
    let mut store = Store::new();
    let frag = InlineReader::new()
        .read("a&#x41;&#66;<cp hex=\"0001\"/>", &mut store, Side::Source)
        .unwrap();
    assert_eq!(frag.text(), "aAB\u{1}");
}

/// A comment annotation keeps its text as comment metadata
#[test]
fn test_read_commentAnnotation_shouldBuildCommentMetadata() {
    let mut store = Store::new();
    InlineReader::new()
        .read(
            "<mrk id=\"m1\" type=\"comment\" value=\"check\" ref=\"#n=n1\">x</mrk>",
            &mut store,
            Side::Source,
        )
        .unwrap();
    let key = store.source_tags().annotation_key("m1").unwrap();
    let annotation = store.source_tags().annotation(key).unwrap();
    assert_eq!(annotation.kind, AnnotationKind::Comment);
    assert_eq!(
        annotation.metadata(),
        &[Metadata::Comment {
            text: Some("check".to_string()),
            note_ref: Some("#n=n1".to_string()),
        }]
    );
}

/// Unknown entities and stray angle brackets are malformed
#[test]
fn test_read_malformedMarkup_shouldFail() {
    for markup in ["a &nbsp; b", "a < b", "<pc id=\"1\">a</ph>"] {
        let mut store = Store::new();
        let result = InlineReader::new().read(markup, &mut store, Side::Source);
        assert!(
            matches!(result, Err(MarkupError::Malformed { .. })),
            "expected malformed markup for {:?}, got {:?}",
            markup,
            result
        );
    }
}

/// Elements outside the inline vocabulary are rejected
#[test]
fn test_read_unsupportedElement_shouldReportName() {
    let mut store = Store::new();
    let err = InlineReader::new()
        .read("a<b>bold</b>", &mut store, Side::Source)
        .unwrap_err();
    assert_eq!(
        err,
        MarkupError::UnsupportedElement {
            element: "b".to_string(),
            offset: 1,
        }
    );
}
