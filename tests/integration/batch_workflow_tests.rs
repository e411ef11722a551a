/*!
 * End-to-end tests for batch document checking
 */

use anyhow::Result;
use codedtext::batch::{check_document, check_files, load_document, load_unit, round_trips};
use codedtext::model::Side;
use crate::common;

/// A well-formed document passes with its content counted
#[test]
fn test_checkDocument_withWellFormedDocument_shouldPass() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_document(temp_dir.path(), "good.json")?;

    let report = check_document(&path, Some("fr"));
    assert!(report.is_ok(), "unexpected error: {:?}", report.error);
    assert_eq!(report.units, 1);
    assert_eq!(report.segments, 2);
    assert_eq!(report.codes, 6);
    assert_eq!(report.annotations, 4);
    assert_eq!(report.split_spans, 0);
    Ok(())
}

/// One malformed document among good ones fails alone
#[test]
fn test_checkFiles_withOneMalformedDocument_shouldIsolateFailure() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let paths = vec![
        common::create_test_document(temp_dir.path(), "a.json")?,
        common::create_malformed_document(temp_dir.path(), "b.json")?,
        common::create_test_document(temp_dir.path(), "c.json")?,
    ];

    let report = check_files(&paths, None, false);
    assert_eq!(report.documents.len(), 3);
    assert_eq!(report.passed, 2);
    assert_eq!(report.failed, 1);
    let error = report.documents[1].error.as_deref().unwrap_or_default();
    assert!(error.contains("unexpected closing tag"), "unexpected error: {}", error);
    assert!(report.documents[2].is_ok());
    Ok(())
}

/// With fail-fast the documents after the first failure are not checked
#[test]
fn test_checkFiles_failFast_shouldStopAtFirstFailure() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let paths = vec![
        common::create_malformed_document(temp_dir.path(), "a.json")?,
        common::create_test_document(temp_dir.path(), "b.json")?,
    ];

    let report = check_files(&paths, None, true);
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.failed, 1);
    Ok(())
}

/// Files that are not documents are reported, not fatal
#[test]
fn test_checkDocument_withInvalidJson_shouldReportDocumentError() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "bad.json", "{ not json")?;
    let report = check_document(&path, None);
    assert!(report.error.as_deref().is_some_and(|e| e.starts_with("Document error")));

    let missing = check_document(&temp_dir.path().join("missing.json"), None);
    assert!(missing.error.as_deref().is_some_and(|e| e.starts_with("File error")));
    Ok(())
}

/// Every fragment of a loaded document survives a render and read cycle
#[test]
fn test_roundTrips_everyLoadedFragment_shouldHold() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_document(temp_dir.path(), "doc.json")?;
    let document = load_document(&path)?;

    for entry in &document.units {
        let unit = load_unit(entry, &document.source_language, document.target_language.as_deref())?;
        for part in unit.parts() {
            assert!(round_trips(part.source(), unit.store())?);
            if let Some(target) = part.fragment(&Side::target("fr")) {
                assert!(round_trips(target, unit.store())?);
            }
        }
    }
    Ok(())
}
