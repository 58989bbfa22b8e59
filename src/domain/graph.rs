//! Dependency Graph Model
//!
//! Turns a merged [`DependencyMetadata`] mapping into a directed graph and
//! derives per-function metrics from it.
//!
//! An edge `A -> B` means "B depends on A". Edges exist only between
//! functions present in the mapping; a dependency naming an unknown function
//! is kept in the metadata but never becomes an edge or a metric. A function
//! listing itself produces a self-loop and marks it recursive.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::domain::metadata::{DependencyMetadata, FunctionName};

/// Structural metrics for one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetrics {
    /// Functions whose dependency list names this one.
    pub in_degree: usize,
    /// Entries of this function's own list that resolve to known functions.
    pub out_degree: usize,
    pub is_recursive: bool,
}

impl NodeMetrics {
    /// Raw importance score, used only for visual emphasis.
    pub fn importance(&self) -> usize {
        self.in_degree + self.out_degree
    }
}

/// Compute metrics for every function in `metadata`.
///
/// O(N*M): in-degree needs a scan over every dependency list.
pub fn build_metrics(metadata: &DependencyMetadata) -> BTreeMap<FunctionName, NodeMetrics> {
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(metadata.len());
    for deps in metadata.values() {
        let mut seen = HashSet::new();
        for dep in deps {
            if metadata.contains_key(dep) && seen.insert(dep.as_str()) {
                *in_degree.entry(dep.as_str()).or_default() += 1;
            }
        }
    }

    metadata
        .iter()
        .map(|(name, deps)| {
            let metrics = NodeMetrics {
                in_degree: in_degree.get(name.as_str()).copied().unwrap_or(0),
                out_degree: deps.iter().filter(|d| metadata.contains_key(*d)).count(),
                is_recursive: deps.iter().any(|d| d == name),
            };
            (name.clone(), metrics)
        })
        .collect()
}

/// Largest raw importance across all nodes, 0 for an edgeless graph.
pub fn max_importance(metrics: &BTreeMap<FunctionName, NodeMetrics>) -> usize {
    metrics.values().map(NodeMetrics::importance).max().unwrap_or(0)
}

/// Normalize a node's importance into `[0, 1]`.
///
/// With `max_importance == 0` every node gets the baseline `0.0`.
pub fn compute_importance(metrics: &NodeMetrics, max_importance: usize) -> f64 {
    if max_importance == 0 {
        return 0.0;
    }
    (metrics.importance() as f64 / max_importance as f64).clamp(0.0, 1.0)
}

/// Partition functions into groups connected through dependency edges in
/// either direction. Groups come out ordered by their smallest member.
pub fn related_functions(metadata: &DependencyMetadata) -> Vec<BTreeSet<FunctionName>> {
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (func, deps) in metadata {
        for dep in deps {
            if metadata.contains_key(dep) {
                dependents.entry(dep.as_str()).or_default().push(func.as_str());
            }
        }
    }

    let mut groups = Vec::new();
    let mut processed: HashSet<&str> = HashSet::new();

    for start in metadata.keys() {
        if processed.contains(start.as_str()) {
            continue;
        }
        let mut group = BTreeSet::new();
        let mut stack = vec![start.as_str()];
        processed.insert(start.as_str());

        while let Some(func) = stack.pop() {
            group.insert(func.to_string());
            let outgoing = metadata
                .get(func)
                .into_iter()
                .flatten()
                .map(String::as_str)
                .filter(|d| metadata.contains_key(*d));
            let incoming = dependents.get(func).into_iter().flatten().copied();
            for next in outgoing.chain(incoming) {
                if processed.insert(next) {
                    stack.push(next);
                }
            }
        }
        groups.push(group);
    }

    groups
}

/// Directed graph over the functions of one metadata mapping.
#[derive(Debug)]
pub struct DependencyGraph {
    pub graph: DiGraph<FunctionName, ()>,
    pub node_map: HashMap<FunctionName, NodeIndex>,
    /// Resolvable edges `(dependency, dependent)` in first-seen order.
    edge_order: Vec<(FunctionName, FunctionName)>,
}

impl DependencyGraph {
    pub fn from_metadata(metadata: &DependencyMetadata) -> Self {
        let mut graph = DiGraph::<FunctionName, ()>::with_capacity(metadata.len(), metadata.len());
        let mut node_map = HashMap::with_capacity(metadata.len());

        for func in metadata.keys() {
            let idx = graph.add_node(func.clone());
            node_map.insert(func.clone(), idx);
        }

        let mut edge_order = Vec::new();
        for (func, deps) in metadata {
            let to = node_map[func];
            for dep in deps {
                let Some(&from) = node_map.get(dep) else {
                    continue;
                };
                if !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                    edge_order.push((dep.clone(), func.clone()));
                }
            }
        }

        Self {
            graph,
            node_map,
            edge_order,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.node_map.get(name).copied()
    }

    pub fn contains_edge(&self, dependency: &str, dependent: &str) -> bool {
        match (self.node_index(dependency), self.node_index(dependent)) {
            (Some(a), Some(b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Node names in sorted order.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.node_map.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Edge addition order for animations: functions in mapping order, then
    /// their dependencies in declared order, each edge once.
    pub fn edge_sequence(&self) -> &[(FunctionName, FunctionName)] {
        &self.edge_order
    }

    /// Layer index for each node: roots at 0, dependents one layer below
    /// their first-reached dependency. Nodes reachable only through cycles
    /// start a new traversal at layer 0.
    pub fn layers(&self) -> BTreeMap<FunctionName, usize> {
        let mut layer: HashMap<NodeIndex, usize> = HashMap::with_capacity(self.node_count());
        let names = self.node_names();

        let is_root = |idx: NodeIndex| {
            self.graph
                .neighbors_directed(idx, Direction::Incoming)
                .all(|n| n == idx)
        };

        let roots: Vec<NodeIndex> = names
            .iter()
            .map(|n| self.node_map[*n])
            .filter(|idx| is_root(*idx))
            .collect();
        let leftovers: Vec<NodeIndex> = names.iter().map(|n| self.node_map[*n]).collect();

        for start in roots.into_iter().chain(leftovers) {
            if layer.contains_key(&start) {
                continue;
            }
            layer.insert(start, 0);
            let mut queue = VecDeque::from([start]);
            while let Some(idx) = queue.pop_front() {
                let next_layer = layer[&idx] + 1;
                let mut children: Vec<NodeIndex> = self
                    .graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .collect();
                children.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
                for child in children {
                    if !layer.contains_key(&child) {
                        layer.insert(child, next_layer);
                        queue.push_back(child);
                    }
                }
            }
        }

        layer
            .into_iter()
            .map(|(idx, l)| (self.graph[idx].clone(), l))
            .collect()
    }
}

/// Input shared by all renderers for one visualization call. Derived fresh
/// from the metadata every time.
#[derive(Debug)]
pub struct GraphView<'a> {
    pub metadata: &'a DependencyMetadata,
    pub graph: DependencyGraph,
    pub metrics: BTreeMap<FunctionName, NodeMetrics>,
    pub max_importance: usize,
}

impl<'a> GraphView<'a> {
    pub fn new(metadata: &'a DependencyMetadata) -> Self {
        let metrics = build_metrics(metadata);
        let max_importance = max_importance(&metrics);
        Self {
            metadata,
            graph: DependencyGraph::from_metadata(metadata),
            metrics,
            max_importance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn metrics_for(&self, name: &str) -> NodeMetrics {
        self.metrics.get(name).copied().unwrap_or(NodeMetrics {
            in_degree: 0,
            out_degree: 0,
            is_recursive: false,
        })
    }

    /// Normalized importance, `None` when the graph has no edges at all.
    pub fn importance(&self, name: &str) -> Option<f64> {
        if self.max_importance == 0 {
            return None;
        }
        Some(compute_importance(&self.metrics_for(name), self.max_importance))
    }

    /// Number of dependencies `name` declares, resolvable or not.
    pub fn declared_dependencies(&self, name: &str) -> usize {
        self.metadata.get(name).map_or(0, Vec::len)
    }
}
