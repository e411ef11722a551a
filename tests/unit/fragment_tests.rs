/*!
 * Tests for fragment mutations
 */

use codedtext::errors::FragmentError;
use codedtext::model::{AnnotationKind, Content, Fragment, Side, Store, TagType};
use crate::common;

/// Deleting one half of a pair is rejected, deleting the whole pair releases it
#[test]
fn test_delete_withPartialPair_shouldFailAndKeepContent() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);
    let before = frag.coded_text().to_string();

    let err = frag.delete(&mut store, 6, 10).unwrap_err();
    assert!(matches!(err, FragmentError::InvalidRange { start: 6, end: 10, .. }));
    assert_eq!(frag.coded_text(), before);
    assert_eq!(store.source_tags().len(), 3);

    frag.delete(&mut store, 6, 14).unwrap();
    assert_eq!(frag.text(), "Hello  world");
    assert_eq!(store.source_tags().len(), 1);
    assert!(store.source_tags().opening_key("1").is_none());
}

/// A bound inside a marker is not a valid range
#[test]
fn test_delete_boundInsideMarker_shouldFail() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);
    assert!(matches!(
        frag.delete(&mut store, 7, 12),
        Err(FragmentError::InvalidRange { .. })
    ));
}

/// Protected content hides its markers and comes back unchanged
#[test]
fn test_protect_thenShow_shouldRestoreCodedText() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);
    let before = frag.coded_text().to_string();

    frag.protect(&mut store, 6, 14).unwrap();
    assert_eq!(frag.display_with_ids(&store).unwrap(), "Hello {pc} world{ph:2}");
    assert_eq!(frag.own_tags(&store).unwrap().len(), 1);
    // Hidden tags stay registered
    assert_eq!(store.source_tags().len(), 3);

    assert_eq!(frag.show_protected_content(&mut store).unwrap(), 1);
    assert_eq!(frag.coded_text(), before);
}

/// Protecting half of a pair is rejected like a delete
#[test]
fn test_protect_withPartialPair_shouldFail() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);
    assert!(matches!(
        frag.protect(&mut store, 10, 20),
        Err(FragmentError::InvalidRange { .. })
    ));
}

/// An annotation crossing a code span is flagged and the code span isolated
#[test]
fn test_annotate_crossingCodeSpan_shouldMarkOverlap() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);

    let key = frag.annotate(&mut store, 0, Some(10), AnnotationKind::Generic, None).unwrap();
    assert_eq!(frag.display_with_ids(&store).unwrap(), "{om:3}Hello {oc:1}bo{cm:3}ld{cc:1} world{ph:2}");

    let annotation = store.get(&Side::Source, key).unwrap();
    assert!(!annotation.can_overlap());
    let opening = store.source_tags().opening_key("1").unwrap();
    assert!(store.get(&Side::Source, opening).unwrap().isolated());
}

/// A nested annotation leaves the other spans alone
#[test]
fn test_annotate_nestedRange_shouldKeepOverlapDefaults() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);

    let key = frag.annotate(&mut store, 8, Some(12), AnnotationKind::Term, None).unwrap();
    assert_eq!(frag.display_with_ids(&store).unwrap(), "Hello {oc:1}{om:3}bold{cm:3}{cc:1} world{ph:2}");
    let opening = store.source_tags().opening_key("1").unwrap();
    assert!(!store.get(&Side::Source, opening).unwrap().isolated());
    assert_eq!(
        frag.get_or_create_annotation(&mut store, 10, Some(14), Some(&AnnotationKind::Term), AnnotationKind::Term)
            .unwrap(),
        key
    );
}

/// A copy in another store does not depend on the original
#[test]
fn test_cloneInto_thenClearOriginal_shouldKeepCopy() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);
    let mut other = Store::new();
    let copy = frag.clone_into(&store, &mut other, Side::target("fr")).unwrap();

    assert!(frag.content_eq(&store, &copy, &other).unwrap());
    frag.clear(&mut store).unwrap();
    assert!(store.source_tags().is_empty());
    assert_eq!(copy.display_with_ids(&other).unwrap(), "Hello {oc:1}bold{cc:1} world{ph:2}");
}

/// A marker whose tag was released no longer resolves
#[test]
fn test_releasedTag_shouldReportUnknownReference() {
    let mut store = Store::new();
    let mut frag = Fragment::source();
    frag.append("ab");
    let key = frag.append_standalone_code(&mut store, "1", "<br/>").unwrap();
    store.tags_mut(&Side::Source).unwrap().release(key).unwrap();

    let err = frag.display_with_ids(&store).unwrap_err();
    assert_eq!(err, FragmentError::UnknownTagReference { key, position: Some(2) });
}

/// Inserted closing codes take the span attributes of their opening
#[test]
fn test_insertCode_closing_shouldPairWithOpening() {
    let mut store = Store::new();
    let mut frag = Fragment::source();
    frag.append("abc");
    frag.insert_code(&mut store, TagType::Opening, "1", "<u>", 1).unwrap();
    frag.insert_code(&mut store, TagType::Closing, "1", "</u>", 4).unwrap();
    assert_eq!(frag.display_with_ids(&store).unwrap(), "a{oc:1}b{cc:1}c");
    assert_eq!(frag.text(), "abc");
}

/// Contents walk text runs and tags in order
#[test]
fn test_contents_shouldListRunsAndTags() {
    let mut store = Store::new();
    let frag = common::bold_fragment(&mut store);
    let contents = frag.contents(&store).unwrap();
    assert_eq!(contents.len(), 6);
    assert!(matches!(contents[0], Content::Text("Hello ")));
    assert!(matches!(contents[1], Content::Tag(_, tag) if tag.data() == Some("<b>")));
    assert!(matches!(contents[5], Content::Tag(_, tag) if tag.tag_type() == TagType::Standalone));
}

/// Removing annotations leaves codes in place
#[test]
fn test_removeAnnotations_shouldKeepCodes() {
    let mut store = Store::new();
    let mut frag = common::bold_fragment(&mut store);
    frag.annotate(&mut store, 0, None, AnnotationKind::Comment, None).unwrap();
    assert_eq!(frag.remove_annotations(&mut store, None).unwrap(), 2);
    assert_eq!(frag.display_with_ids(&store).unwrap(), "Hello {oc:1}bold{cc:1} world{ph:2}");
}
