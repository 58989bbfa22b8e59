use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::common::config::AnalyzerConfig;
use crate::common::error::ExtractionError;
use crate::domain::metadata::DependencyMetadata;
use crate::infrastructure::concurrency::build_worker_pool;
use crate::infrastructure::metadata_cache::{FileStamp, MetadataCache};
use crate::infrastructure::monitoring::{
    MetricsCollector, CACHE_HITS, CACHE_MISSES, FILES_PROCESSED, FUNCTIONS_FOUND, TOTAL_ERRORS,
};
use crate::ports::MetadataExtractor;

/// Discovers candidate files and extracts their metadata on a bounded pool.
pub struct BatchAnalyzer {
    cache: Arc<MetadataCache>,
    metrics: Arc<MetricsCollector>,
    pool: rayon::ThreadPool,
    max_file_size: u64,
    excluded_directories: Vec<String>,
}

impl BatchAnalyzer {
    pub fn new(
        config: &AnalyzerConfig,
        cache: Arc<MetadataCache>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        Ok(Self {
            cache,
            metrics,
            pool: build_worker_pool(config.effective_workers())?,
            max_file_size: config.max_file_size_bytes(),
            excluded_directories: config.excluded_directories.clone(),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Walk `root` and return every file small enough to analyze, sorted.
    ///
    /// Subtrees under an excluded directory name are not entered. Oversized
    /// files are skipped with a warning.
    pub fn collect_candidates(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && self.is_excluded(root, entry.path())));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("Error walking {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(meta) if meta.len() <= self.max_file_size => files.push(entry.into_path()),
                Ok(_) => warn!("Skipping {}: exceeds size limit", entry.path().display()),
                Err(e) => error!("Error checking {}: {}", entry.path().display(), e),
            }
        }

        files
    }

    /// Excluded names are matched against whole path components below `root`.
    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            self.excluded_directories.iter().any(|ex| *ex == name)
        })
    }

    /// Extract metadata for every file, in parallel.
    ///
    /// Results arrive in completion order, not submission order. A file whose
    /// extraction fails is logged and left out; it never aborts the batch.
    pub fn analyze_batch(
        &self,
        files: &[PathBuf],
        extractor: &dyn MetadataExtractor,
    ) -> Vec<(PathBuf, DependencyMetadata)> {
        let (tx, rx) = mpsc::channel();

        self.pool.scope(|scope| {
            for path in files {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = self.analyze_single_file(path, extractor);
                    let _ = tx.send((path.clone(), outcome));
                });
            }
        });
        drop(tx);

        let mut results = Vec::with_capacity(files.len());
        for (path, outcome) in rx {
            match outcome {
                Ok(metadata) => {
                    info!("Successfully analyzed {}", path.display());
                    self.metrics.increment(FILES_PROCESSED, 1);
                    self.metrics.increment(FUNCTIONS_FOUND, metadata.len() as u64);
                    results.push((path, metadata));
                }
                Err(e) => {
                    error!("Error analyzing {}: {}", path.display(), e);
                    self.metrics.increment(TOTAL_ERRORS, 1);
                }
            }
        }
        results
    }

    fn analyze_single_file(
        &self,
        path: &Path,
        extractor: &dyn MetadataExtractor,
    ) -> Result<DependencyMetadata, ExtractionError> {
        if let Some(cached) = self.cache.get(path) {
            debug!("Cache hit for {}", path.display());
            self.metrics.increment(CACHE_HITS, 1);
            return Ok(cached);
        }
        self.metrics.increment(CACHE_MISSES, 1);

        // taken before reading, so an edit during extraction invalidates the entry
        let stamp = FileStamp::of(path).ok();
        let metadata = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(path)))
            .map_err(|payload| ExtractionError::Crashed {
                path: path.to_path_buf(),
                message: panic_message(payload.as_ref()),
            })??;

        if let Some(stamp) = stamp {
            self.cache.put_stamped(path, stamp, &metadata);
        }
        Ok(metadata)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
