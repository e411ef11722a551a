/*!
 * Tests for units, parts and notes
 */

use std::collections::BTreeMap;

use codedtext::batch::{InlineSegment, InlineUnit, load_unit};
use codedtext::errors::FragmentError;
use codedtext::model::{Metadata, Note, Side, TargetState, Unit, UnitObject};

fn segment(id: Option<&str>, source: &str, target: Option<&str>) -> InlineSegment {
    InlineSegment {
        id: id.map(str::to_string),
        ignorable: false,
        source: source.to_string(),
        target: target.map(str::to_string),
        state: Some(TargetState::Translated),
    }
}

fn sample_unit() -> Unit {
    let entry = InlineUnit {
        id: "u1".to_string(),
        original_data: BTreeMap::new(),
        segments: vec![
            segment(Some("s1"), "Hello <ph id=\"1\"/>", Some("Bonjour <ph id=\"1\"/>")),
            segment(None, "Second", None),
        ],
        notes: vec![Note {
            id: Some("n1".to_string()),
            text: "Greeting".to_string(),
            category: Some("context".to_string()),
        }],
    };
    load_unit(&entry, "en", Some("fr")).unwrap()
}

/// Fragment identifiers resolve to parts, notes and tags of each side
#[test]
fn test_resolveReference_shouldFindEveryObjectKind() {
    let unit = sample_unit();
    assert!(matches!(unit.resolve_reference("#s1"), Some(UnitObject::Part(p)) if p.id() == Some("s1")));
    assert!(matches!(unit.resolve_reference("#n=n1"), Some(UnitObject::Note(n)) if n.text == "Greeting"));
    assert!(matches!(
        unit.resolve_reference("#1"),
        Some(UnitObject::Tag { side: Side::Source, .. })
    ));
    assert!(matches!(
        unit.resolve_reference("#t=1"),
        Some(UnitObject::Tag { side: Side::Target(ref locale), .. }) if locale == "fr"
    ));
    assert!(unit.resolve_reference("s1").is_none());
    assert!(unit.resolve_reference("#n=missing").is_none());
}

/// Part ids must not collide with any other id of the unit
#[test]
fn test_setPartId_usedByCode_shouldFail() {
    let mut unit = sample_unit();
    assert_eq!(
        unit.set_part_id(1, Some("1")),
        Err(FragmentError::invalid_attribute("id", "1"))
    );
    unit.set_part_id(1, Some("s2")).unwrap();
    assert!(matches!(unit.object_from_id("s2"), Some(UnitObject::Part(_))));
}

/// A note annotation references the note it creates
#[test]
fn test_annotateWithNote_shouldLinkNote() {
    let mut unit = sample_unit();
    let (key, note_id) = unit.annotate_with_note(1, &Side::Source, 0, Some(6), "Check this").unwrap();

    let annotation = unit.store().source_tags().annotation(key).unwrap();
    let note_ref = match &annotation.metadata()[0] {
        Metadata::Comment { note_ref: Some(r), .. } => r.clone(),
        other => panic!("unexpected metadata {:?}", other),
    };
    assert_eq!(note_ref, format!("#n={}", note_id));
    assert!(matches!(unit.resolve_reference(&note_ref), Some(UnitObject::Note(n)) if n.text == "Check this"));
    assert_eq!(unit.notes().len(), 2);
}

/// An annotation opened in one segment and closed in the next is followed across both
#[test]
fn test_annotatedSpans_acrossParts_shouldJoinText() {
    let entry = InlineUnit {
        id: "u2".to_string(),
        original_data: BTreeMap::new(),
        segments: vec![
            segment(None, "Hello <sm id=\"a1\"/>big", None),
            segment(None, " world<em startRef=\"a1\"/>!", None),
        ],
        notes: Vec::new(),
    };
    let unit = load_unit(&entry, "en", None).unwrap();
    let spans = unit.annotated_spans(&Side::Source, None).unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].id, "a1");
    assert_eq!((spans[0].start_part, spans[0].end_part), (0, 1));
    assert_eq!(spans[0].text, "big world");
    assert_eq!(unit.plain_text(&Side::Source), "Hello big world!");
}

/// Segments with source text need a non-empty target
#[test]
fn test_nonEmptySourcesHaveTargets_shouldSpotMissingTarget() {
    let unit = sample_unit();
    assert!(!unit.non_empty_sources_have_targets("fr"));
    assert_eq!(unit.part(0).unwrap().state(), Some(TargetState::Translated));
    assert_eq!(unit.segments().count(), 2);
}
