/*!
 * Integration tests for the application controller
 */

use anyhow::Result;
use codedtext::app_config::{Config, OutputForm};
use codedtext::app_controller::Controller;
use crate::common;

/// Test the controller with an invalid configuration
#[test]
fn test_controller_withInvalidConfig_shouldFail() {
    let mut config = Config::default();
    config.source_language = "xyz".to_string();
    assert!(Controller::with_config(config).is_err());
}

/// Checking a directory picks up documents by extension only
#[test]
fn test_checkPath_withDirectory_shouldCheckDocumentsOnly() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    common::create_test_document(temp_dir.path(), "a.json")?;
    common::create_malformed_document(temp_dir.path(), "b.json")?;
    common::create_test_file(temp_dir.path(), "notes.txt", "not a document")?;
    let nested = temp_dir.path().join("nested");
    std::fs::create_dir(&nested)?;
    common::create_test_document(&nested, "c.json")?;

    let controller = Controller::with_config(Config::default())?;
    assert_eq!(controller.collect_documents(temp_dir.path()).len(), 3);

    let report = controller.check_path(temp_dir.path())?;
    assert_eq!(report.documents.len(), 3);
    assert_eq!(report.passed, 2);
    assert_eq!(report.failed, 1);
    assert!(report.documents[1].path.ends_with("b.json"));
    Ok(())
}

/// A path that does not exist is an error
#[test]
fn test_checkPath_withMissingPath_shouldFail() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let controller = Controller::with_config(Config::default())?;
    assert!(controller.check_path(&temp_dir.path().join("nowhere")).is_err());
    Ok(())
}

/// Each output form prints one entry per fragment
#[test]
fn test_renderFile_eachForm_shouldRenderEveryFragment() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_document(temp_dir.path(), "doc.json")?;
    let controller = Controller::with_config(Config::default())?;

    let text = controller.render_file(&path, OutputForm::Text)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "u1/0 [source] Hello world");
    assert_eq!(lines[1], "u1/0 [fr] Bonjour monde");
    assert_eq!(lines[4], "u1/2 [fr] Voir ici.");

    let debug = controller.render_file(&path, OutputForm::Debug)?;
    assert!(debug.starts_with("u1/0 [source] Hello {oc:1}world{cc:1}{ph:2}"));

    let xliff = controller.render_file(&path, OutputForm::Xliff)?;
    assert!(xliff.starts_with(
        "u1/0 [source] Hello <pc id=\"1\" dataRefStart=\"d1\" dataRefEnd=\"d2\">world</pc><ph id=\"2\" dataRef=\"d3\"/>"
    ));
    assert!(xliff.contains("<mrk id=\"m1\" type=\"comment\" value=\"check this\">ici</mrk>"));

    let json: serde_json::Value = serde_json::from_str(&controller.render_file(&path, OutputForm::Json)?)?;
    let entries = json.as_array().map(Vec::len).unwrap_or_default();
    assert_eq!(entries, 5);
    assert_eq!(json[0]["objects"][1]["object"], "opening");
    assert_eq!(json[0]["objects"][1]["family"], "code");
    Ok(())
}

/// Rendering without original data leaves dataRef attributes out
#[test]
fn test_renderFile_withoutOriginalData_shouldOmitDataRefs() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_document(temp_dir.path(), "doc.json")?;
    let mut config = Config::default();
    config.render.with_original_data = false;
    let controller = Controller::with_config(config)?;

    let xliff = controller.render_file(&path, OutputForm::Xliff)?;
    assert!(!xliff.contains("dataRef"));
    Ok(())
}
