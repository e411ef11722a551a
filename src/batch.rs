/*!
 * Batch documents: JSON files holding units whose segments are written as
 * XLIFF 2 inline markup.
 *
 * Loading a document builds one `Unit` (and one store) per unit entry.
 * Checking a document verifies, for every fragment, that rendering and
 * reading back gives the same content, and that no closing code precedes
 * its opening. Each document is checked on its own: a failure is recorded
 * in its report and never affects the other documents.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::errors::AppError;
use crate::language_utils;
use crate::model::part::TargetState;
use crate::model::store::{DataRefMap, Side, Store};
use crate::model::unit::{Note, Unit};
use crate::model::fragment::Fragment;
use crate::render::{FragmentObject, Renderer, XliffWriter};
use crate::xliff::InlineReader;

/// A document as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineDocument {
    #[serde(default)]
    pub id: Option<String>,
    pub source_language: String,
    #[serde(default)]
    pub target_language: Option<String>,
    pub units: Vec<InlineUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineUnit {
    pub id: String,
    /// Original data referenced by `dataRef` attributes
    #[serde(default)]
    pub original_data: BTreeMap<String, String>,
    pub segments: Vec<InlineSegment>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineSegment {
    #[serde(default)]
    pub id: Option<String>,
    /// Content between segments
    #[serde(default)]
    pub ignorable: bool,
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub state: Option<TargetState>,
}

/// Outcome of checking one document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentReport {
    pub path: String,
    pub units: usize,
    pub segments: usize,
    pub codes: usize,
    pub annotations: usize,
    /// Spans split by the renderer because they cross another span
    pub split_spans: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of checking several documents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    pub passed: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn push(&mut self, report: DocumentReport) {
        if report.is_ok() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.documents.push(report);
    }
}

/// Read a document file
pub fn load_document(path: &Path) -> Result<InlineDocument, AppError> {
    let file = File::open(path).map_err(|e| AppError::File(format!("{}: {}", path.display(), e)))?;
    let document: InlineDocument = serde_json::from_reader(BufReader::new(file))?;
    Ok(document)
}

/// Build a unit from its document entry.
pub fn load_unit(entry: &InlineUnit, source_language: &str, target_language: Option<&str>) -> Result<Unit, AppError> {
    let mut unit = Unit::new(&entry.id, source_language);
    unit.target_locale = target_language.map(str::to_string);
    let data_refs = DataRefMap::from_pairs(entry.original_data.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let reader = InlineReader::with_data_refs(&data_refs);

    for note in &entry.notes {
        unit.add_note(note.clone())?;
    }

    for (index, segment) in entry.segments.iter().enumerate() {
        if segment.ignorable {
            unit.append_ignorable();
        } else {
            unit.append_segment();
        }
        if segment.id.is_some() {
            unit.set_part_id(index, segment.id.as_deref())?;
        }
        let Some((part, store)) = unit.part_with_store(index) else {
            return Err(AppError::Document(format!("unit '{}' lost part {}", entry.id, index)));
        };
        if let Some(state) = segment.state {
            part.set_state(state)?;
        }
        let source = reader.read(&segment.source, store, Side::Source)?;
        part.set_fragment(store, source)?;
        if let Some(markup) = &segment.target {
            let locale = target_language.ok_or_else(|| {
                AppError::Document(format!(
                    "unit '{}' has a target but the document has no target language",
                    entry.id
                ))
            })?;
            let target = reader.read(markup, store, Side::target(locale))?;
            part.set_fragment(store, target)?;
        }
    }
    debug!("Loaded unit {} with {} part(s)", entry.id, unit.len());
    Ok(unit)
}

/// Render a fragment and read it back into a scratch store; true when the content is unchanged.
///
/// Protected content is written expanded, so the comparison is made against
/// an expanded copy.
pub fn round_trips(fragment: &Fragment, store: &Store) -> Result<bool, AppError> {
    let side = fragment.side().clone();
    let markup = XliffWriter::new().with_original_data(true).render_fragment(fragment, store)?;
    let data_refs = store.data_ids();

    let mut expected_store = Store::new();
    let mut expected = fragment.clone_into(store, &mut expected_store, side.clone())?;
    expected.show_protected_content(&mut expected_store)?;

    let mut scratch = Store::new();
    seed_earlier_openings(fragment, store, &mut scratch)?;
    let copy = InlineReader::with_data_refs(&data_refs).read(&markup, &mut scratch, side)?;
    Ok(expected.content_eq(&expected_store, &copy, &scratch)?)
}

/// Copy into `scratch` the openings, kept in other fragments of the unit, of codes this fragment closes
fn seed_earlier_openings(fragment: &Fragment, store: &Store, scratch: &mut Store) -> Result<(), AppError> {
    let Some(tags) = store.tags(fragment.side()) else {
        return Ok(());
    };
    let renderer = Renderer::with_protected_content(fragment, store)?;
    for object in renderer.iter() {
        let FragmentObject::Closing(event) = object else {
            continue;
        };
        if !(event.is_code() && event.paired_in_unit) {
            continue;
        }
        if let Some(key) = tags.opening_key(event.id()) {
            tags.copy_into(key, scratch.tags_mut(fragment.side())?)?;
        }
    }
    Ok(())
}

/// Check one unit and add its counts to the report.
pub fn check_unit(unit: &Unit, report: &mut DocumentReport) -> Result<(), AppError> {
    let mut sides = vec![Side::Source];
    sides.extend(unit.store().target_locales().map(Side::target));
    for side in &sides {
        unit.verify_openings_before_closings(side)?;
    }

    for (index, part) in unit.parts().iter().enumerate() {
        if part.is_segment() {
            report.segments += 1;
        }
        let segment = part.id().map(str::to_string).unwrap_or_else(|| index.to_string());
        for side in &sides {
            let Some(fragment) = part.fragment(side) else {
                continue;
            };
            let renderer = Renderer::new(fragment, unit.store())?;
            report.split_spans += renderer.split_count();
            for (_, tag) in fragment.own_tags(unit.store())? {
                if tag.is_code() {
                    report.codes += 1;
                } else {
                    report.annotations += 1;
                }
            }
            if !round_trips(fragment, unit.store())? {
                return Err(AppError::RoundTrip {
                    unit: unit.id().to_string(),
                    segment: segment.clone(),
                });
            }
        }
    }
    report.units += 1;
    Ok(())
}

fn check_loaded(document: &InlineDocument, target_language: Option<&str>, report: &mut DocumentReport) -> Result<(), AppError> {
    language_utils::validate_locale(&document.source_language)
        .map_err(|e| AppError::Document(format!("invalid source language: {}", e)))?;
    if let (Some(expected), Some(actual)) = (target_language, document.target_language.as_deref()) {
        if !language_utils::language_codes_match(expected, actual) {
            warn!(
                "Document target language {} differs from the configured {}",
                actual, expected
            );
        }
    }
    for entry in &document.units {
        let unit = load_unit(entry, &document.source_language, document.target_language.as_deref())?;
        check_unit(&unit, report)?;
    }
    Ok(())
}

/// Check one document file. Never fails: errors end up in the report.
pub fn check_document(path: &Path, target_language: Option<&str>) -> DocumentReport {
    let mut report = DocumentReport {
        path: path.display().to_string(),
        ..Default::default()
    };
    let result = load_document(path).and_then(|document| check_loaded(&document, target_language, &mut report));
    if let Err(e) = result {
        report.error = Some(e.to_string());
    }
    report
}

/// Check several documents independently.
pub fn check_files(paths: &[PathBuf], target_language: Option<&str>, fail_fast: bool) -> BatchReport {
    let mut batch = BatchReport::default();
    for path in paths {
        let report = check_document(path, target_language);
        let failed = !report.is_ok();
        batch.push(report);
        if failed && fail_fast {
            warn!("Stopping after the first failing document: {}", path.display());
            break;
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(source: &str) -> InlineSegment {
        InlineSegment {
            id: None,
            ignorable: false,
            source: source.to_string(),
            target: None,
            state: None,
        }
    }

    #[test]
    fn test_loadUnit_withOriginalData_shouldRebuildCodes() {
        let entry = InlineUnit {
            id: "u1".to_string(),
            original_data: [("d1", "<b>"), ("d2", "</b>")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            segments: vec![segment("Hello <pc id=\"1\" dataRefStart=\"d1\" dataRefEnd=\"d2\">world</pc>")],
            notes: Vec::new(),
        };
        let unit = load_unit(&entry, "en", None).unwrap();
        let source = unit.part(0).unwrap().source();
        assert_eq!(source.text(), "Hello world");
        let codes = unit.ordered_codes(&Side::Source).unwrap();
        assert_eq!(codes[0].2.data.as_deref(), Some("<b>"));
    }

    #[test]
    fn test_checkUnit_crossingAnnotation_shouldRoundTrip() {
        let entry = InlineUnit {
            id: "u1".to_string(),
            original_data: BTreeMap::new(),
            segments: vec![segment("<pc id=\"1\">a<sm id=\"m1\" type=\"comment\" value=\"note\"/>b</pc>c<em startRef=\"m1\"/>")],
            notes: Vec::new(),
        };
        let unit = load_unit(&entry, "en", None).unwrap();
        let mut report = DocumentReport::default();
        check_unit(&unit, &mut report).unwrap();
        assert_eq!(report.codes, 2);
        assert_eq!(report.annotations, 2);
        assert_eq!(report.split_spans, 1);
    }

    #[test]
    fn test_checkUnit_codeAcrossSegments_shouldLoadAndRoundTrip() {
        let entry = InlineUnit {
            id: "u1".to_string(),
            original_data: BTreeMap::new(),
            segments: vec![segment("Hello <sc id=\"1\"/>world"), segment("again<ec startRef=\"1\"/>")],
            notes: Vec::new(),
        };
        let unit = load_unit(&entry, "en", None).unwrap();
        assert_eq!(unit.part(1).unwrap().source().display_with_ids(unit.store()).unwrap(), "again{cc:1}");
        let mut report = DocumentReport::default();
        check_unit(&unit, &mut report).unwrap();
        assert_eq!(report.segments, 2);
        assert_eq!(report.codes, 2);
        assert_eq!(report.split_spans, 0);
    }

    #[test]
    fn test_roundTrips_withProtectedRange_shouldHold() {
        let mut store = Store::new();
        let mut frag = Fragment::source();
        frag.append("Keep ");
        frag.open_code(&mut store, "1", "<b>").unwrap();
        frag.append("this");
        frag.close_code(&mut store, "1", "</b>").unwrap();
        frag.append(" safe");
        frag.protect(&mut store, 5, 13).unwrap();
        assert_eq!(frag.text(), "Keep  safe");
        assert!(round_trips(&frag, &store).unwrap());
    }

    #[test]
    fn test_loadUnit_targetWithoutLanguage_shouldFail() {
        let mut seg = segment("a");
        seg.target = Some("b".to_string());
        let entry = InlineUnit {
            id: "u1".to_string(),
            original_data: BTreeMap::new(),
            segments: vec![seg],
            notes: Vec::new(),
        };
        assert!(matches!(load_unit(&entry, "en", None), Err(AppError::Document(_))));
    }
}
