//! Visualization orchestration.
//!
//! Runs the static, interactive, animated and metrics stages in that order
//! against one snapshot of the metadata. Each stage is retried a bounded
//! number of times; the first stage that still fails aborts the run, leaving
//! artifacts of earlier stages on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::common::config::AnalyzerConfig;
use crate::common::error::{RenderStage, VisualizationError};
use crate::domain::graph::{GraphView, NodeMetrics};
use crate::domain::metadata::{DependencyMetadata, FunctionName};
use crate::infrastructure::animation::AnimatedFlowExporter;
use crate::infrastructure::interactive::InteractiveGraphExporter;
use crate::infrastructure::monitoring::MetricsCollector;
use crate::infrastructure::static_render::StaticGraphExporter;
use crate::ports::{artifact_path, GraphExporter};

/// Paths written by one visualization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualizationReport {
    pub static_graph: Option<PathBuf>,
    pub interactive: Option<PathBuf>,
    pub animated: Option<PathBuf>,
    pub metrics: Option<PathBuf>,
}

impl VisualizationReport {
    pub fn artifacts(&self) -> Vec<&Path> {
        [&self.static_graph, &self.interactive, &self.animated, &self.metrics]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }
}

pub struct Visualizer {
    viz_directory: PathBuf,
    static_exporter: StaticGraphExporter,
    render_attempts: u32,
    retry_delay: Duration,
    collector: Arc<MetricsCollector>,
    /// Metrics of the most recent run, overwritten every time.
    metrics_cache: BTreeMap<FunctionName, NodeMetrics>,
}

impl Visualizer {
    pub fn new(config: &AnalyzerConfig, collector: Arc<MetricsCollector>) -> Self {
        Self {
            viz_directory: config.viz_directory(),
            static_exporter: StaticGraphExporter::from_config(config),
            render_attempts: config.render_attempts.max(1),
            retry_delay: config.render_retry_delay(),
            collector,
            metrics_cache: BTreeMap::new(),
        }
    }

    pub fn viz_directory(&self) -> &Path {
        &self.viz_directory
    }

    pub fn metrics_cache(&self) -> &BTreeMap<FunctionName, NodeMetrics> {
        &self.metrics_cache
    }

    /// Write `{base}_metrics.json`. Does nothing before the first run.
    pub fn export_metrics(&self, base: &Path) -> Result<Option<PathBuf>> {
        if self.metrics_cache.is_empty() {
            warn!("No metrics to export");
            return Ok(None);
        }
        let output = artifact_path(base, "_metrics.json");
        let body = serde_json::to_string_pretty(&self.metrics_cache)?;
        fs::write(&output, body).with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Metrics exported to {}", output.display());
        Ok(Some(output))
    }

    pub fn visualize_dependencies(
        &mut self,
        metadata: &DependencyMetadata,
        base_name: &str,
    ) -> Result<VisualizationReport, VisualizationError> {
        if metadata.is_empty() {
            warn!("No metadata to visualize");
            self.metrics_cache.clear();
            return Ok(VisualizationReport::default());
        }

        fs::create_dir_all(&self.viz_directory).map_err(|source| {
            VisualizationError::OutputDirectory {
                path: self.viz_directory.clone(),
                source,
            }
        })?;
        let base = self.viz_directory.join(base_name);
        info!("Creating visualizations in: {}", base.display());

        let view = GraphView::new(metadata);
        self.metrics_cache = view.metrics.clone();

        let static_graph =
            self.run_stage(RenderStage::Static, &self.static_exporter, &view, &base)?;
        let interactive =
            self.run_stage(RenderStage::Interactive, &InteractiveGraphExporter, &view, &base)?;
        let animated = self.run_stage(RenderStage::Animated, &AnimatedFlowExporter, &view, &base)?;
        let metrics = self.retry(RenderStage::Metrics, || self.export_metrics(&base))?;

        Ok(VisualizationReport {
            static_graph,
            interactive,
            animated,
            metrics,
        })
    }

    fn run_stage(
        &self,
        stage: RenderStage,
        exporter: &dyn GraphExporter,
        view: &GraphView,
        base: &Path,
    ) -> Result<Option<PathBuf>, VisualizationError> {
        self.retry(stage, || {
            self.collector
                .track(&format!("{}_render", stage), || exporter.export(view, base))
        })
    }

    fn retry<T>(
        &self,
        stage: RenderStage,
        f: impl FnMut() -> Result<T>,
    ) -> Result<T, VisualizationError> {
        with_retries(stage, self.render_attempts, self.retry_delay, f)
    }
}

/// Call `f` up to `attempts` times, doubling `delay` between tries.
pub(crate) fn with_retries<T>(
    stage: RenderStage,
    attempts: u32,
    mut delay: Duration,
    mut f: impl FnMut() -> Result<T>,
) -> Result<T, VisualizationError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    "Attempt {}/{} of {} visualization failed: {:#}",
                    attempt, attempts, stage, e
                );
                thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                error!("Failed to create {} visualization: {:#}", stage, e);
                return Err(VisualizationError::stage(stage, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn visualizer(root: &Path, format: &str) -> Visualizer {
        let config = AnalyzerConfig {
            graph_format: format.to_string(),
            render_retry_delay_ms: 0,
            ..AnalyzerConfig::rooted_at(root)
        };
        Visualizer::new(&config, Arc::new(MetricsCollector::new()))
    }

    #[test]
    fn test_retry_stops_after_configured_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = with_retries(RenderStage::Static, 3, Duration::ZERO, || {
            calls += 1;
            anyhow::bail!("still broken")
        });
        assert_eq!(calls, 3);
        assert_eq!(result.unwrap_err().failed_stage(), Some(RenderStage::Static));
    }

    #[test]
    fn test_retry_recovers() {
        let mut calls = 0;
        let value = with_retries(RenderStage::Interactive, 2, Duration::ZERO, || {
            calls += 1;
            if calls == 1 {
                anyhow::bail!("transient");
            }
            Ok(calls)
        })
        .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_export_metrics_without_run_is_noop() {
        let dir = tempdir().unwrap();
        let viz = visualizer(dir.path(), "dot");
        assert!(viz.export_metrics(&dir.path().join("deps")).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_metrics_cache_overwritten_per_run() {
        let dir = tempdir().unwrap();
        let mut viz = visualizer(dir.path(), "dot");

        let mut first = DependencyMetadata::new();
        first.insert("old".to_string(), vec![]);
        viz.visualize_dependencies(&first, "first").unwrap();
        assert!(viz.metrics_cache().contains_key("old"));

        let mut second = DependencyMetadata::new();
        second.insert("new".to_string(), vec![]);
        viz.visualize_dependencies(&second, "second").unwrap();
        assert!(!viz.metrics_cache().contains_key("old"));
        assert!(viz.metrics_cache().contains_key("new"));
    }

    #[test]
    fn test_empty_run_discards_previous_metrics() {
        let dir = tempdir().unwrap();
        let mut viz = visualizer(dir.path(), "dot");

        let mut first = DependencyMetadata::new();
        first.insert("old".to_string(), vec![]);
        viz.visualize_dependencies(&first, "first").unwrap();
        assert!(!viz.metrics_cache().is_empty());

        viz.visualize_dependencies(&DependencyMetadata::new(), "empty")
            .unwrap();
        assert!(viz.metrics_cache().is_empty());
        let stale = viz.viz_directory().join("empty");
        assert!(viz.export_metrics(&stale).unwrap().is_none());
        assert!(!viz.viz_directory().join("empty_metrics.json").exists());
    }

    #[test]
    fn test_unsupported_format_without_graphviz_fails_static_stage() {
        let dir = tempdir().unwrap();
        let mut viz = visualizer(dir.path(), "no-such-format");
        let mut metadata = DependencyMetadata::new();
        metadata.insert("main".to_string(), vec![]);

        let err = viz.visualize_dependencies(&metadata, "deps").unwrap_err();
        assert_eq!(err.failed_stage(), Some(RenderStage::Static));
        // later stages never ran
        assert!(!viz.viz_directory().join("deps.html").exists());
    }
}
