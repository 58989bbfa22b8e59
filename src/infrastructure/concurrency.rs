//! Concurrency management for depviz.
//! Builds the bounded worker pool used by the batch analyzer.

use anyhow::{Context, Result};
use tracing::debug;

/// Build a local rayon pool with `workers` threads (at least one).
/// A local pool keeps batch sizing independent of any global rayon state.
pub fn build_worker_pool(workers: usize) -> Result<rayon::ThreadPool> {
    let workers = workers.max(1);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("depviz-worker-{}", i))
        .build()
        .context("Failed to build worker pool")?;

    debug!(
        "Initialized worker pool: {} workers (system has {} cores)",
        workers,
        num_cpus::get()
    );

    Ok(pool)
}
