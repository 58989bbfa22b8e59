// Command-line entry point for depviz.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use depviz::application::selection::prompt_selection;
use depviz::application::{AnalyzeUsecase, Visualizer};
use depviz::common::config::{AnalyzerConfig, DEFAULT_CONFIG_FILE};
use depviz::common::logging::init_logging;
use depviz::domain::metadata::FunctionName;
use depviz::infrastructure::monitoring::TOTAL_EXECUTION_TIME;
use depviz::infrastructure::{BatchAnalyzer, CommentMetadataExtractor, MetadataCache, MetricsCollector};

#[derive(Parser, Debug)]
#[command(author, version, about = "Visualize function dependencies declared in source comments", long_about = None)]
struct Cli {
    /// Source file or directory to analyze (prompted for when omitted)
    path: Option<PathBuf>,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Visualize every function instead of choosing interactively
    #[arg(short, long)]
    all: bool,

    /// Base name of the generated files (defaults to the input's file stem)
    #[arg(long)]
    output_name: Option<String>,

    /// Remove cached metadata, optionally only entries older than DAYS
    #[arg(long, value_name = "DAYS", num_args = 0..=1)]
    clear_cache: Option<Option<u64>>,

    /// Ignore and do not populate the metadata cache
    #[arg(long)]
    no_cache: bool,

    /// Worker threads for extraction
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = AnalyzerConfig::load(&cli.config);
    if cli.no_cache {
        config.cache_enabled = false;
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }

    let _guard = match init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("[WARN] Logging to file disabled: {:#}", e);
            None
        }
    };

    match run(cli, config) {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("\nFatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: AnalyzerConfig) -> Result<ExitCode> {
    let cache = Arc::new(MetadataCache::new(&config));

    if let Some(days) = cli.clear_cache {
        let removed = cache.clear(days);
        println!("Removed {} cache entries", removed);
        if cli.path.is_none() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    let target = match cli.path {
        Some(path) => path,
        None => match prompt_path(&mut io::stdin().lock(), &mut io::stdout())? {
            Some(path) => path,
            None => {
                println!("\nOperation cancelled.");
                return Ok(ExitCode::FAILURE);
            }
        },
    };

    let collector = Arc::new(MetricsCollector::new());
    let started = Instant::now();

    let analyzer = BatchAnalyzer::new(&config, Arc::clone(&cache), Arc::clone(&collector))?;
    let extractor = CommentMetadataExtractor;
    let usecase = AnalyzeUsecase::new(&config, &analyzer, &extractor);

    println!("\nAnalyzing {}...", target.display());
    let metadata = collector.track("extraction", || usecase.extract(&target))?;
    if metadata.is_empty() {
        println!("\nNo functions with metadata found in {}", target.display());
        return Ok(ExitCode::FAILURE);
    }
    println!("\nFound {} functions", metadata.len());

    let functions: Vec<FunctionName> = metadata.keys().cloned().collect();
    let selected = if cli.all {
        functions
    } else {
        match prompt_selection(&functions, &mut io::stdin().lock(), &mut io::stdout())? {
            Some(selected) => selected,
            None => {
                println!("\nNo functions selected for analysis");
                return Ok(ExitCode::FAILURE);
            }
        }
    };

    let base_name = cli
        .output_name
        .unwrap_or_else(|| default_base_name(&target));
    let mut visualizer = Visualizer::new(&config, Arc::clone(&collector));

    println!("\nGenerating visualizations...");
    let outcome = usecase.visualize(&mut visualizer, &metadata, &selected, &base_name);

    collector.record(TOTAL_EXECUTION_TIME, started.elapsed().as_secs_f64());
    match collector.performance_report(&config.metrics_directory()) {
        Ok(report) => info!(
            "Processed {} files, {} functions, {} cache hits, {} errors in {:.2}s",
            report.file_count,
            report.total_functions,
            report.cache_hits,
            report.errors_count,
            report.execution_time
        ),
        Err(e) => warn!("Could not write performance report: {:#}", e),
    }
    let stats = cache.stats();
    info!(
        "Cache: {} memory hits, {} disk hits, {} misses, {} writes",
        stats.memory_hits, stats.disk_hits, stats.misses, stats.writes
    );

    match outcome {
        Ok(report) => {
            for artifact in report.artifacts() {
                println!("  {}", artifact.display());
            }
            println!(
                "\nAnalysis complete! Check the visualizations in: {}",
                visualizer.viz_directory().display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Error during visualization: {:#}", e);
            println!("\nError during visualization: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Ask for an input path until an existing one is given. `None` on EOF.
fn prompt_path<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Option<PathBuf>> {
    writeln!(out, "\n=== Function Dependency Analyzer ===")?;
    writeln!(out, "Enter the path of the file or directory to analyze.")?;

    let mut line = String::new();
    loop {
        write!(out, "\nPath: ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line).context("Failed to read path")? == 0 {
            return Ok(None);
        }
        let candidate = line.trim();
        if candidate.is_empty() {
            writeln!(out, "Error: path cannot be empty. Please try again.")?;
        } else if !Path::new(candidate).exists() {
            writeln!(out, "Error: '{}' not found. Please try again.", candidate)?;
        } else {
            return Ok(Some(PathBuf::from(candidate)));
        }
    }
}

fn default_base_name(target: &Path) -> String {
    target
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "dependencies".to_string())
}
