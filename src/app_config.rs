use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::language_utils;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language of the documents (ISO code or locale)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language of the documents, when they carry targets
    #[serde(default)]
    pub target_language: Option<String>,

    /// Rendering options
    #[serde(default)]
    pub render: RenderConfig,

    /// Batch checking options
    #[serde(default)]
    pub batch: BatchConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Form of the rendered output
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputForm {
    // @form: XLIFF 2 inline markup
    #[default]
    Xliff,
    // @form: Plain text, markers removed
    Text,
    // @form: Coded text with markers shown as {oc:1}
    Debug,
    // @form: Fragment objects as JSON
    Json,
}

impl OutputForm {
    // @returns: Lowercase form identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xliff => "xliff",
            Self::Text => "text",
            Self::Debug => "debug",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutputForm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xliff" => Ok(Self::Xliff),
            "text" => Ok(Self::Text),
            "debug" => Ok(Self::Debug),
            "json" => Ok(Self::Json),
            _ => Err(anyhow!("Invalid output form: {}", s)),
        }
    }
}

/// Rendering configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RenderConfig {
    // @field: Reference original data through dataRef attributes
    #[serde(default = "default_true")]
    pub with_original_data: bool,

    // @field: Output form of the render command
    #[serde(default)]
    pub output: OutputForm,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            with_original_data: default_true(),
            output: OutputForm::default(),
        }
    }
}

/// Batch checking configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchConfig {
    // @field: Extension of document files picked up in directories
    #[serde(default = "default_extension")]
    pub extension: String,

    // @field: Stop at the first failing document
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            fail_fast: false,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching filter of the `log` facade
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        language_utils::validate_locale(&self.source_language)
            .context(format!("Invalid source language: {}", self.source_language))?;
        if let Some(target) = &self.target_language {
            language_utils::validate_locale(target).context(format!("Invalid target language: {}", target))?;
        }

        let extension = self.batch.extension.trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!("Invalid document extension: '{}'", self.batch.extension));
        }

        Ok(())
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).context(format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Config =
            serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json).context(format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }

    /// Document extension without its leading dot
    pub fn extension(&self) -> &str {
        self.batch.extension.trim_start_matches('.')
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: None,
            render: RenderConfig::default(),
            batch: BatchConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
