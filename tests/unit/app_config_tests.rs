/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use codedtext::app_config::{Config, LogLevel, OutputForm};
use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();
    assert_eq!(config.source_language, "en");
    assert_eq!(config.target_language, None);
    assert!(config.render.with_original_data);
    assert_eq!(config.render.output, OutputForm::Xliff);
    assert_eq!(config.batch.extension, "json");
    assert!(!config.batch.fail_fast);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.validate().is_ok());
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();

    config.source_language = "xyz".to_string();
    assert!(config.validate().is_err());
    config.source_language = "en-US".to_string();
    assert!(config.validate().is_ok());

    config.target_language = Some("fr-CA".to_string());
    assert!(config.validate().is_ok());
    config.target_language = Some("".to_string());
    assert!(config.validate().is_err());
    config.target_language = None;

    config.batch.extension = ".json".to_string();
    assert!(config.validate().is_ok());
    assert_eq!(config.extension(), "json");
    config.batch.extension = "js on".to_string();
    assert!(config.validate().is_err());
}

/// Test saving then loading a configuration file
#[test]
fn test_config_saveThenLoad_shouldKeepValues() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = Config::default();
    config.target_language = Some("de".to_string());
    config.render.output = OutputForm::Debug;
    config.log_level = LogLevel::Trace;
    config.save(&path)?;

    assert_eq!(Config::load(&path)?, config);
    Ok(())
}

/// Missing sections fall back to their defaults
#[test]
fn test_config_load_withPartialFile_shouldFillDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{ "target_language": "it", "render": { "output": "json" } }"#,
    )?;

    let config = Config::load(&path)?;
    assert_eq!(config.source_language, "en");
    assert_eq!(config.target_language.as_deref(), Some("it"));
    assert_eq!(config.render.output, OutputForm::Json);
    assert!(config.render.with_original_data);
    Ok(())
}

/// Output forms and log levels parse case-insensitively
#[test]
fn test_fromStr_shouldParseNames() {
    assert_eq!("XLIFF".parse::<OutputForm>().unwrap(), OutputForm::Xliff);
    assert_eq!("debug".parse::<OutputForm>().unwrap().to_string(), "debug");
    assert!("html".parse::<OutputForm>().is_err());
    assert_eq!("Warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
}
