//! Performance metrics collection.
//!
//! Records timings and counters from any thread. Purely observational:
//! nothing in the pipeline reads these values back to make decisions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use tracing::info;

pub const TOTAL_EXECUTION_TIME: &str = "total_execution_time";
pub const FILES_PROCESSED: &str = "files_processed";
pub const FUNCTIONS_FOUND: &str = "functions_found";
pub const CACHE_HITS: &str = "cache_hits";
pub const CACHE_MISSES: &str = "cache_misses";
pub const TOTAL_ERRORS: &str = "total_errors";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Resident set size of this process in MiB.
    pub memory_usage: Option<f64>,
    /// Process CPU percentage since the previous sample.
    pub cpu_usage: Option<f32>,
    pub system_cpu: f32,
    /// Used share of physical memory, in percent.
    pub system_memory: f32,
    pub available_parallelism: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub execution_time: f64,
    pub memory_usage: Option<f64>,
    pub cpu_usage: Option<f32>,
    pub file_count: usize,
    pub total_functions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors_count: u64,
}

pub struct MetricsCollector {
    metrics: DashMap<String, Vec<MetricSample>>,
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        // cpu percentages are deltas against this first refresh
        system.refresh_cpu();
        if let Some(pid) = pid {
            system.refresh_process(pid);
        }
        Self {
            metrics: DashMap::new(),
            system: Mutex::new(system),
            pid,
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, value: f64) {
        let sample = MetricSample {
            timestamp: chrono::Local::now().to_rfc3339(),
            value,
        };
        self.metrics.entry(name.to_string()).or_default().push(sample);
    }

    pub fn increment(&self, name: &str, by: u64) {
        self.record(name, by as f64);
    }

    /// Run `f`, recording `{name}_execution_time` on success and
    /// `{name}_errors` on failure.
    pub fn track<T, E>(&self, name: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let start = Instant::now();
        let result = f();
        match &result {
            Ok(_) => self.record(&format!("{}_execution_time", name), start.elapsed().as_secs_f64()),
            Err(_) => self.record(&format!("{}_errors", name), 1.0),
        }
        result
    }

    /// Run an infallible `f`, recording its execution time.
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        self.record(&format!("{}_execution_time", name), start.elapsed().as_secs_f64());
        value
    }

    pub fn sum(&self, name: &str) -> f64 {
        self.metrics
            .get(name)
            .map(|samples| samples.iter().map(|s| s.value).sum())
            .unwrap_or(0.0)
    }

    pub fn count(&self, name: &str) -> usize {
        self.metrics.get(name).map(|samples| samples.len()).unwrap_or(0)
    }

    pub fn system_metrics(&self) -> SystemMetrics {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.refresh_cpu();
        let process = self
            .pid
            .filter(|pid| system.refresh_process(*pid))
            .and_then(|pid| system.process(pid));

        let total = system.total_memory();
        let system_memory = if total == 0 {
            0.0
        } else {
            (system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        SystemMetrics {
            memory_usage: process.map(|p| p.memory() as f64 / 1024.0 / 1024.0),
            cpu_usage: process.map(|p| p.cpu_usage()),
            system_cpu: system.global_cpu_info().cpu_usage(),
            system_memory,
            available_parallelism: num_cpus::get(),
        }
    }

    fn snapshot(&self) -> BTreeMap<String, Vec<MetricSample>> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Write all samples plus current system metrics to
    /// `<dir>/metrics_<timestamp>.json`.
    pub fn export(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create metrics directory {}", dir.display()))?;
        let path = dir.join(format!("metrics_{}.json", Self::file_stamp()));

        let body = serde_json::json!({
            "system_metrics": self.system_metrics(),
            "application_metrics": self.snapshot(),
        });
        fs::write(&path, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Metrics exported to {}", path.display());
        Ok(path)
    }

    /// Summarize the run and write it to `<dir>/performance_report_<timestamp>.json`.
    pub fn performance_report(&self, dir: &Path) -> Result<PerformanceReport> {
        let system = self.system_metrics();
        let report = PerformanceReport {
            execution_time: self.sum(TOTAL_EXECUTION_TIME),
            memory_usage: system.memory_usage,
            cpu_usage: system.cpu_usage,
            file_count: self.sum(FILES_PROCESSED) as usize,
            total_functions: self.sum(FUNCTIONS_FOUND) as u64,
            cache_hits: self.sum(CACHE_HITS) as u64,
            cache_misses: self.sum(CACHE_MISSES) as u64,
            errors_count: self.sum(TOTAL_ERRORS) as u64,
        };

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create metrics directory {}", dir.display()))?;
        let path = dir.join(format!("performance_report_{}.json", Self::file_stamp()));
        fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(report)
    }

    fn file_stamp() -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_track_records_time_or_error() {
        let collector = MetricsCollector::new();
        let ok: Result<u32, String> = collector.track("render", || Ok(7));
        assert_eq!(ok, Ok(7));
        let err: Result<u32, String> = collector.track("render", || Err("boom".to_string()));
        assert!(err.is_err());

        assert_eq!(collector.count("render_execution_time"), 1);
        assert_eq!(collector.sum("render_errors"), 1.0);
    }

    #[test]
    fn test_concurrent_increments() {
        let collector = Arc::new(MetricsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&collector);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        c.increment(FILES_PROCESSED, 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(collector.count(FILES_PROCESSED), 400);
        assert_eq!(collector.sum(FILES_PROCESSED), 400.0);
    }

    #[test]
    fn test_report_and_export_written() {
        let dir = tempdir().unwrap();
        let collector = MetricsCollector::new();
        collector.increment(FILES_PROCESSED, 3);
        collector.increment(FUNCTIONS_FOUND, 12);
        collector.increment(CACHE_HITS, 1);
        collector.increment(CACHE_HITS, 1);
        collector.increment(CACHE_MISSES, 1);

        let report = collector.performance_report(dir.path()).unwrap();
        assert_eq!(report.file_count, 3);
        assert_eq!(report.total_functions, 12);
        assert_eq!(report.cache_hits, 2);
        assert_eq!(report.cache_misses, 1);

        let exported = collector.export(dir.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(exported).unwrap()).unwrap();
        assert!(json["application_metrics"][FILES_PROCESSED].is_array());
        for key in ["memory_usage", "cpu_usage", "system_cpu", "system_memory"] {
            assert!(json["system_metrics"].get(key).is_some(), "{} missing", key);
        }
    }

    #[test]
    fn test_system_metrics_report_this_process() {
        let collector = MetricsCollector::new();
        let metrics = collector.system_metrics();

        let rss = metrics.memory_usage.unwrap();
        assert!(rss > 0.0);
        assert!(metrics.cpu_usage.unwrap() >= 0.0);
        assert!((0.0..=100.0).contains(&metrics.system_memory));
        assert!(metrics.system_cpu >= 0.0);
        assert!(metrics.available_parallelism >= 1);

        let report = collector.performance_report(tempdir().unwrap().path()).unwrap();
        assert!(report.memory_usage.is_some());
        assert!(report.cpu_usage.is_some());
    }
}
