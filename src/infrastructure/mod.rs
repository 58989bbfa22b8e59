// Infrastructure: filesystem, process and rendering backends.

pub mod animation;
pub mod batch_analyzer;
pub mod concurrency;
pub mod extractor;
pub mod interactive;
pub mod metadata_cache;
pub mod monitoring;
pub mod raster;
pub mod static_render;

pub use animation::AnimatedFlowExporter;
pub use batch_analyzer::BatchAnalyzer;
pub use extractor::CommentMetadataExtractor;
pub use interactive::InteractiveGraphExporter;
pub use metadata_cache::MetadataCache;
pub use monitoring::MetricsCollector;
pub use static_render::StaticGraphExporter;
