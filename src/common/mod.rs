// Cross-cutting concerns: configuration, errors, logging.

pub mod config;
pub mod error;
pub mod logging;

pub use config::AnalyzerConfig;
pub use error::{CacheError, ExtractionError, RenderStage, VisualizationError};
