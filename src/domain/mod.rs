// Domain model: metadata, dependency graph, metrics and styling.

pub mod graph;
pub mod language;
pub mod metadata;
pub mod style;

pub use graph::{build_metrics, compute_importance, max_importance, related_functions, DependencyGraph, GraphView, NodeMetrics};
pub use language::Language;
pub use metadata::{DependencyMetadata, FunctionName};
