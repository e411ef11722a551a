// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use codedtext::app_config::{self, Config, OutputForm};
use codedtext::app_controller::Controller;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for OutputForm to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOutputForm {
    Xliff,
    Text,
    Debug,
    Json,
}

impl From<CliOutputForm> for OutputForm {
    fn from(cli_form: CliOutputForm) -> Self {
        match cli_form {
            CliOutputForm::Xliff => OutputForm::Xliff,
            CliOutputForm::Text => OutputForm::Text,
            CliOutputForm::Debug => OutputForm::Debug,
            CliOutputForm::Json => OutputForm::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that every segment of the documents renders and reads back unchanged
    Check {
        /// Document file or directory of documents
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Stop at the first failing document
        #[arg(long)]
        fail_fast: bool,
    },

    /// Render the segments of a document
    Render {
        /// Document file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output form
        #[arg(short, long, value_enum)]
        output: Option<CliOutputForm>,

        /// Reference original data through dataRef attributes
        #[arg(long)]
        with_original_data: Option<bool>,
    },

    /// Generate shell completions for codedtext
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// codedtext - inline codes and annotations for localization content
#[derive(Parser, Debug)]
#[command(name = "codedtext")]
#[command(version)]
#[command(about = "Check and render coded-text documents")]
#[command(long_about = "codedtext loads documents whose segments are written as XLIFF 2 inline markup,
renders them back and checks that nothing is lost on the way.

EXAMPLES:
    codedtext check docs/                     # Check every .json document under docs/
    codedtext check --fail-fast docs/         # Stop at the first failing document
    codedtext render doc.json                 # Print XLIFF inline markup per segment
    codedtext render -o debug doc.json        # Print coded text with {oc:1} markers
    codedtext -t fr check doc.json            # Expect French targets
    codedtext completions bash > codedtext.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Target language code (e.g., 'fr', 'de-CH')
    #[arg(short, long, global = true)]
    target_language: Option<String>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn main() -> Result<()> {
    // Trace until the configuration decides the level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "codedtext", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_or_create_config(Path::new(&cli.config_path), cli.log_level.clone())?;
    if let Some(target) = &cli.target_language {
        config.target_language = Some(target.clone());
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Check { path, fail_fast } => {
            config.batch.fail_fast |= fail_fast;
            let controller = Controller::with_config(config)?;
            let report = controller.check_path(&path)?;
            if report.failed > 0 {
                return Err(anyhow!("{} of {} document(s) failed", report.failed, report.documents.len()));
            }
        }
        Commands::Render {
            file,
            output,
            with_original_data,
        } => {
            if let Some(value) = with_original_data {
                config.render.with_original_data = value;
            }
            let form = output.map(OutputForm::from).unwrap_or(config.render.output);
            let controller = Controller::with_config(config)?;
            let rendered = controller.render_file(&file, form)?;
            println!("{}", rendered);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

// Load the configuration file, or write a default one when it does not exist
fn load_or_create_config(config_path: &Path, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path.display());
        let config = Config::default();
        config
            .save(config_path)
            .context(format!("Failed to write default config to file: {}", config_path.display()))?;
        info!("Default configuration written to {}", config_path.display());
        config
    };

    // Command line log level wins over the file
    if let Some(level) = log_level {
        config.log_level = level.into();
    }
    Ok(config)
}
