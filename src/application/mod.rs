// Application layer: wires collection, extraction and rendering together.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::common::config::AnalyzerConfig;
use crate::common::error::VisualizationError;
use crate::domain::language::Language;
use crate::domain::metadata::{self, DependencyMetadata, FunctionName};
use crate::infrastructure::batch_analyzer::BatchAnalyzer;
use crate::ports::MetadataExtractor;

pub mod selection;
pub mod visualizer;

pub use selection::Selection;
pub use visualizer::{VisualizationReport, Visualizer};

pub struct AnalyzeUsecase<'a> {
    pub analyzer: &'a BatchAnalyzer,
    pub extractor: &'a dyn MetadataExtractor,
    pub languages: Vec<Language>,
}

impl<'a> AnalyzeUsecase<'a> {
    pub fn new(
        config: &AnalyzerConfig,
        analyzer: &'a BatchAnalyzer,
        extractor: &'a dyn MetadataExtractor,
    ) -> Self {
        Self {
            analyzer,
            extractor,
            languages: Language::parse_list(&config.supported_languages),
        }
    }

    /// Candidate files under `target` (a file or a directory) written in one
    /// of the supported languages.
    pub fn collect(&self, target: &Path) -> Result<Vec<PathBuf>> {
        if !target.exists() {
            bail!("{} does not exist", target.display());
        }
        let files: Vec<PathBuf> = self
            .analyzer
            .collect_candidates(target)
            .into_iter()
            .filter(|path| {
                Language::from_path(path).is_some_and(|lang| self.languages.contains(&lang))
            })
            .collect();
        info!("Found {} candidate files under {}", files.len(), target.display());
        Ok(files)
    }

    /// Collect, extract and merge everything under `target`.
    pub fn extract(&self, target: &Path) -> Result<DependencyMetadata> {
        let files = self.collect(target)?;
        if files.is_empty() {
            warn!("No supported source files found in {}", target.display());
            return Ok(DependencyMetadata::new());
        }
        let results = self.analyzer.analyze_batch(&files, self.extractor);
        Ok(metadata::merge(results))
    }

    /// Render the selected functions and their direct dependencies.
    pub fn visualize(
        &self,
        visualizer: &mut Visualizer,
        metadata: &DependencyMetadata,
        selected: &[FunctionName],
        base_name: &str,
    ) -> Result<VisualizationReport, VisualizationError> {
        let filtered = metadata::select(metadata, selected);
        visualizer.visualize_dependencies(&filtered, base_name)
    }
}
