/*!
 * Common test utilities for the codedtext test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use codedtext::model::{Fragment, Store};

/// Route library logs through the test harness; safe to call from every test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a well-formed document with codes, an annotation and a French target
pub fn create_test_document(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = r#"{
  "id": "doc1",
  "source_language": "en",
  "target_language": "fr",
  "units": [
    {
      "id": "u1",
      "original_data": { "d1": "<b>", "d2": "</b>", "d3": "<br/>" },
      "segments": [
        {
          "id": "s1",
          "source": "Hello <pc id=\"1\" dataRefStart=\"d1\" dataRefEnd=\"d2\">world</pc><ph id=\"2\" dataRef=\"d3\"/>",
          "target": "Bonjour <pc id=\"1\" dataRefStart=\"d1\" dataRefEnd=\"d2\">monde</pc><ph id=\"2\" dataRef=\"d3\"/>",
          "state": "translated"
        },
        { "ignorable": true, "source": " " },
        {
          "source": "See <mrk id=\"m1\" type=\"comment\" value=\"check this\">here</mrk>.",
          "target": "Voir <mrk id=\"m1\" type=\"comment\" value=\"check this\">ici</mrk>."
        }
      ],
      "notes": [ { "id": "n1", "text": "A note", "category": null } ]
    }
  ]
}"#;
    create_test_file(dir, filename, content)
}

/// Creates a document whose markup closes a code that was never opened
pub fn create_malformed_document(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = r#"{
  "source_language": "en",
  "units": [
    { "id": "u1", "segments": [ { "source": "Broken </pc> markup" } ] }
  ]
}"#;
    create_test_file(dir, filename, content)
}

/// Source fragment `Hello {oc:1}bold{cc:1} world{ph:2}`
pub fn bold_fragment(store: &mut Store) -> Fragment {
    let mut frag = Fragment::source();
    frag.append("Hello ");
    frag.open_code(store, "1", "<b>").unwrap();
    frag.append("bold");
    frag.close_code(store, "1", "</b>").unwrap();
    frag.append(" world");
    frag.append_standalone_code(store, "2", "<br/>").unwrap();
    frag
}

/// Source fragment whose code spans cross: `{oc:1}a{oc:2}b{cc:1}c{cc:2}`
pub fn crossing_fragment(store: &mut Store) -> Fragment {
    let mut frag = Fragment::source();
    frag.open_code(store, "1", "<b>").unwrap();
    frag.append("a");
    frag.open_code(store, "2", "<i>").unwrap();
    frag.append("b");
    frag.close_code(store, "1", "</b>").unwrap();
    frag.append("c");
    frag.close_code(store, "2", "</i>").unwrap();
    frag
}
