//! Configuration for depviz.
//!
//! Loaded from a TOML file; every key is optional and falls back to its
//! default. Problems with the file are logged and never abort the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "depviz.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub supported_languages: Vec<String>,
    pub output_directory: PathBuf,
    pub cache_enabled: bool,
    pub cache_directory: PathBuf,
    pub log_level: String,
    pub max_file_size_mb: u64,
    pub parallel_processing: bool,
    pub max_workers: usize,
    pub graph_dpi: u32,
    pub graph_format: String,
    pub excluded_directories: Vec<String>,
    /// Attempts per rendering stage before the stage is reported as failed.
    pub render_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub render_retry_delay_ms: u64,
    pub memory_cache_capacity: usize,
    pub memory_cache_ttl_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            supported_languages: ["python", "java", "c", "cpp", "rust"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_directory: PathBuf::from("output"),
            cache_enabled: true,
            cache_directory: PathBuf::from(".cache"),
            log_level: "info".to_string(),
            max_file_size_mb: 10,
            parallel_processing: true,
            max_workers: num_cpus::get(),
            graph_dpi: 300,
            graph_format: "png".to_string(),
            excluded_directories: [".git", "__pycache__", "venv", ".venv", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            render_attempts: 2,
            render_retry_delay_ms: 1000,
            memory_cache_capacity: 100,
            memory_cache_ttl_secs: 300,
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from `path`, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        let mut config = if path.exists() {
            match fs::read_to_string(path) {
                Ok(text) => Self::from_toml_str(&text).unwrap_or_else(|e| {
                    warn!("Could not parse config file {}: {}", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    warn!("Could not read config file {}: {}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.absolutize();
        config
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn absolutize(&mut self) {
        if self.output_directory.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                self.output_directory = cwd.join(&self.output_directory);
            }
        }
    }

    pub fn viz_directory(&self) -> PathBuf {
        self.output_directory.join("visualizations")
    }

    pub fn log_directory(&self) -> PathBuf {
        self.output_directory.join("logs")
    }

    pub fn metrics_directory(&self) -> PathBuf {
        self.output_directory.join("metrics")
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Worker count actually used by the batch analyzer.
    pub fn effective_workers(&self) -> usize {
        if self.parallel_processing {
            self.max_workers.max(1)
        } else {
            1
        }
    }

    pub fn memory_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_cache_ttl_secs)
    }

    pub fn render_retry_delay(&self) -> Duration {
        Duration::from_millis(self.render_retry_delay_ms)
    }

    /// Config rooted in `root`, for tests and embedding.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            output_directory: root.join("output"),
            cache_directory: root.join(".cache"),
            ..Self::default()
        }
    }
}
