use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::common::error::ExtractionError;
use crate::domain::graph::GraphView;
use crate::domain::metadata::DependencyMetadata;

pub mod dot_exporter;

/// Reads one source file and returns the dependency metadata declared in it.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<DependencyMetadata, ExtractionError>;
}

impl<F> MetadataExtractor for F
where
    F: Fn(&Path) -> Result<DependencyMetadata, ExtractionError> + Send + Sync,
{
    fn extract(&self, path: &Path) -> Result<DependencyMetadata, ExtractionError> {
        self(path)
    }
}

/// Writes one view of a dependency graph. `base` is the output path without
/// extension; implementations append their own suffix and return the path
/// they wrote, or `None` when there was nothing to write.
pub trait GraphExporter {
    fn export(&self, view: &GraphView, base: &Path) -> anyhow::Result<Option<PathBuf>>;
}

/// `base` with `suffix` appended verbatim, so `out/deps` + `.html` gives
/// `out/deps.html` even when the base name itself contains dots.
pub fn artifact_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
