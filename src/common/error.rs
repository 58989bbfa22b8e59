//! Error types for depviz.
//!
//! Three categories, each with its own recovery policy:
//! - [`CacheError`] never leaves the cache; callers see a miss instead.
//! - [`ExtractionError`] drops one file from a batch.
//! - [`VisualizationError`] is returned to the top-level caller.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Persistence failure inside the metadata cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache record: {0}")]
    Encode(#[source] bincode::Error),

    #[error("corrupt cache record {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
}

/// A single file's metadata could not be extracted.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("extractor crashed on {path}: {message}")]
    Crashed { path: PathBuf, message: String },

    #[error("unsupported source language: {0}")]
    UnsupportedLanguage(PathBuf),
}

/// The rendering stage a [`VisualizationError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Static,
    Interactive,
    Animated,
    Metrics,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStage::Static => "static",
            RenderStage::Interactive => "interactive",
            RenderStage::Animated => "animated",
            RenderStage::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

/// A rendering stage failed after exhausting its retries.
#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error("failed to create {stage} visualization: {source}")]
    Stage {
        stage: RenderStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("failed to prepare visualization directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VisualizationError {
    pub fn stage(stage: RenderStage, source: anyhow::Error) -> Self {
        VisualizationError::Stage {
            stage,
            source: source.into(),
        }
    }

    /// The failing stage, if the error came from one.
    pub fn failed_stage(&self) -> Option<RenderStage> {
        match self {
            VisualizationError::Stage { stage, .. } => Some(*stage),
            VisualizationError::OutputDirectory { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_keeps_cause() {
        let err = VisualizationError::stage(RenderStage::Animated, anyhow::anyhow!("gif encoder"));
        assert_eq!(err.failed_stage(), Some(RenderStage::Animated));
        let msg = err.to_string();
        assert!(msg.contains("animated"));
        assert!(msg.contains("gif encoder"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
