//! Static graph rendering.
//!
//! `dot` output is written directly. Every other format is produced by the
//! Graphviz `dot` executable; when it is missing, PNG falls back to the
//! native rasterizer.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::common::config::AnalyzerConfig;
use crate::domain::graph::GraphView;
use crate::infrastructure::raster;
use crate::ports::dot_exporter::DotExporter;
use crate::ports::{artifact_path, GraphExporter};

const GRAPHVIZ_COMMAND: &str = "dot";

pub struct StaticGraphExporter {
    format: String,
    dpi: u32,
}

impl StaticGraphExporter {
    pub fn new(format: impl Into<String>, dpi: u32) -> Self {
        Self {
            format: format.into().to_ascii_lowercase(),
            dpi,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.graph_format.clone(), config.graph_dpi)
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

impl GraphExporter for StaticGraphExporter {
    fn export(&self, view: &GraphView, base: &Path) -> Result<Option<PathBuf>> {
        if view.is_empty() {
            return Ok(None);
        }

        let output = artifact_path(base, &format!(".{}", self.format));
        let dot = DotExporter::to_dot(view);

        if self.format == "dot" {
            fs::write(&output, dot)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        } else if graphviz_available() {
            run_graphviz(&dot, &build_command_spec(&self.format, self.dpi, &output))?;
        } else if self.format == "png" {
            warn!("Graphviz not found, rendering {} natively", output.display());
            raster::render_full(view)
                .save(&output)
                .with_context(|| format!("Failed to save {}", output.display()))?;
        } else {
            bail!(
                "Graphviz `{}` not found in PATH; format '{}' requires it",
                GRAPHVIZ_COMMAND,
                self.format
            );
        }

        info!("Static visualization saved to {}", output.display());
        Ok(Some(output))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Graphviz invocation
// ═══════════════════════════════════════════════════════════════════════════

/// Describes the Graphviz command for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotCommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

pub fn build_command_spec(format: &str, dpi: u32, output: &Path) -> DotCommandSpec {
    DotCommandSpec {
        program: GRAPHVIZ_COMMAND.to_string(),
        args: vec![
            format!("-T{}", format),
            format!("-Gdpi={}", dpi),
            "-o".to_string(),
            output.display().to_string(),
        ],
    }
}

fn graphviz_available() -> bool {
    match Command::new(GRAPHVIZ_COMMAND)
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("Graphviz check failed: {}", e);
            false
        }
    }
}

fn run_graphviz(dot: &str, spec: &DotCommandSpec) -> Result<()> {
    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute {}", spec.program))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(dot.as_bytes())
            .context("Failed to send graph to Graphviz")?;
    }

    let output = child
        .wait_with_output()
        .context("Failed to wait for Graphviz")?;
    if !output.status.success() {
        bail!(
            "{} exited with {:?}: {}",
            spec.program,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::DependencyMetadata;
    use tempfile::tempdir;

    #[test]
    fn test_build_command_spec() {
        let spec = build_command_spec("svg", 150, Path::new("/tmp/out/deps.svg"));
        assert_eq!(spec.program, "dot");
        assert_eq!(spec.args, vec!["-Tsvg", "-Gdpi=150", "-o", "/tmp/out/deps.svg"]);
    }

    #[test]
    fn test_dot_format_writes_text() {
        let dir = tempdir().unwrap();
        let mut metadata = DependencyMetadata::new();
        metadata.insert("main".to_string(), vec!["helper".to_string()]);
        metadata.insert("helper".to_string(), vec![]);
        let view = GraphView::new(&metadata);

        let exporter = StaticGraphExporter::new("DOT", 300);
        let path = exporter.export(&view, &dir.path().join("deps")).unwrap().unwrap();
        assert_eq!(path, dir.path().join("deps.dot"));
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\"helper\" -> \"main\";"));
    }

    #[test]
    fn test_empty_view_writes_nothing() {
        let dir = tempdir().unwrap();
        let metadata = DependencyMetadata::new();
        let view = GraphView::new(&metadata);
        let out = StaticGraphExporter::new("dot", 300)
            .export(&view, &dir.path().join("deps"))
            .unwrap();
        assert!(out.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
