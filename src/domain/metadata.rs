// Dependency metadata: the function -> declared dependencies mapping.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Opaque function identifier.
pub type FunctionName = String;

/// Function name -> declared dependencies, in declaration order.
///
/// Keys are sorted so every traversal over the mapping is deterministic.
pub type DependencyMetadata = BTreeMap<FunctionName, Vec<FunctionName>>;

/// Merge per-file results into one mapping.
///
/// Results are ordered by path first, so a function declared in several files
/// resolves to the declaration from the last path. No namespacing is applied.
pub fn merge(mut results: Vec<(PathBuf, DependencyMetadata)>) -> DependencyMetadata {
    results.sort_by(|a, b| a.0.cmp(&b.0));
    let mut merged = DependencyMetadata::new();
    for (_, metadata) in results {
        merged.extend(metadata);
    }
    merged
}

/// Keep the selected functions plus their direct dependencies that exist in
/// the mapping. Unknown selections are ignored.
pub fn select(metadata: &DependencyMetadata, selected: &[FunctionName]) -> DependencyMetadata {
    let mut filtered = DependencyMetadata::new();
    for func in selected {
        let Some(deps) = metadata.get(func) else {
            continue;
        };
        filtered.insert(func.clone(), deps.clone());
        for dep in deps {
            if let Some(dep_deps) = metadata.get(dep) {
                filtered.insert(dep.clone(), dep_deps.clone());
            }
        }
    }
    filtered
}

/// Total number of declared dependencies, resolvable or not.
pub fn declared_dependency_count(metadata: &DependencyMetadata) -> usize {
    metadata.values().map(Vec::len).sum()
}
