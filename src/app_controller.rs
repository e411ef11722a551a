use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::app_config::{Config, OutputForm};
use crate::batch::{self, BatchReport};
use crate::model::store::Side;
use crate::model::unit::Unit;
use crate::render::{FragmentObject, ObjectSummary, Renderer, XliffWriter};

// @module: Application controller for document checking and rendering

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Document files under a directory, sorted, filtered by the configured extension
    pub fn collect_documents(&self, input_dir: &Path) -> Vec<PathBuf> {
        let extension = self.config.extension();
        let mut paths: Vec<PathBuf> = WalkDir::new(input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(extension)))
            .collect();
        paths.sort();
        paths
    }

    /// Check a document file or every document of a directory
    pub fn check_path(&self, input_path: &Path) -> Result<BatchReport> {
        let paths = if input_path.is_file() {
            vec![input_path.to_path_buf()]
        } else if input_path.is_dir() {
            self.collect_documents(input_path)
        } else {
            return Err(anyhow!("Input path does not exist: {:?}", input_path));
        };

        if paths.is_empty() {
            warn!("No .{} documents found in {:?}", self.config.extension(), input_path);
        }
        debug!("Checking {} document(s)", paths.len());

        let report = batch::check_files(
            &paths,
            self.config.target_language.as_deref(),
            self.config.batch.fail_fast,
        );
        for document in &report.documents {
            match &document.error {
                None => info!(
                    "OK {}: {} unit(s), {} segment(s), {} code(s), {} annotation(s), {} split span(s)",
                    document.path,
                    document.units,
                    document.segments,
                    document.codes,
                    document.annotations,
                    document.split_spans
                ),
                Some(e) => error!("FAILED {}: {}", document.path, e),
            }
        }
        info!("Checked {} document(s): {} passed, {} failed", report.documents.len(), report.passed, report.failed);
        Ok(report)
    }

    /// Render every segment of a document, one line per fragment
    pub fn render_file(&self, input_file: &Path, form: OutputForm) -> Result<String> {
        let document = batch::load_document(input_file).map_err(|e| anyhow!("{}", e))?;
        let mut lines = Vec::new();
        let mut objects: Vec<serde_json::Value> = Vec::new();
        for entry in &document.units {
            let unit = batch::load_unit(entry, &document.source_language, document.target_language.as_deref())
                .map_err(|e| anyhow!("{}", e))
                .context(format!("Failed to load unit '{}'", entry.id))?;
            for (index, side, rendered) in self.render_unit(&unit, form)? {
                let side_name = side.locale().unwrap_or("source").to_string();
                match rendered {
                    Rendered::Line(line) => lines.push(format!("{}/{} [{}] {}", unit.id(), index, side_name, line)),
                    Rendered::Objects(summaries) => objects.push(serde_json::json!({
                        "unit": unit.id(),
                        "part": index,
                        "side": side_name,
                        "objects": summaries,
                    })),
                }
            }
        }
        if form == OutputForm::Json {
            return serde_json::to_string_pretty(&objects).context("Failed to serialize rendered objects");
        }
        Ok(lines.join("\n"))
    }

    fn render_unit(&self, unit: &Unit, form: OutputForm) -> Result<Vec<(usize, Side, Rendered)>> {
        let writer = XliffWriter::new().with_original_data(self.config.render.with_original_data);
        let store = unit.store();
        let mut sides = vec![Side::Source];
        sides.extend(store.target_locales().map(Side::target));
        let mut out = Vec::new();
        for (index, part) in unit.parts().iter().enumerate() {
            for side in &sides {
                let Some(fragment) = part.fragment(side) else {
                    continue;
                };
                let rendered = match form {
                    OutputForm::Xliff => Rendered::Line(writer.render_fragment(fragment, store)?),
                    OutputForm::Text => Rendered::Line(fragment.text()),
                    OutputForm::Debug => Rendered::Line(fragment.display_with_ids(store)?),
                    OutputForm::Json => Rendered::Objects(
                        Renderer::new(fragment, store)?
                            .iter()
                            .map(FragmentObject::summary)
                            .collect(),
                    ),
                };
                out.push((index, side.clone(), rendered));
            }
        }
        Ok(out)
    }
}

enum Rendered {
    Line(String),
    Objects(Vec<ObjectSummary>),
}
