//! Dependency DOT Exporter
//!
//! Renders a [`GraphView`] as Graphviz DOT with metric-keyed node styling.

use std::fmt::Write as _;

use crate::domain::graph::GraphView;
use crate::domain::metadata::FunctionName;
use crate::domain::style::{palette, NodeStyle};

/// How an edge is drawn in one DOT document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEmphasis {
    Normal,
    /// Already-shown edge in an animation frame.
    Muted,
    /// Edge added by the current animation frame.
    Highlighted,
}

pub struct DotExporter;

impl DotExporter {
    /// Full graph, every resolvable edge in normal style.
    pub fn to_dot(view: &GraphView) -> String {
        let edges: Vec<(&FunctionName, &FunctionName, EdgeEmphasis)> = view
            .graph
            .edge_sequence()
            .iter()
            .map(|(from, to)| (from, to, EdgeEmphasis::Normal))
            .collect();
        Self::to_dot_with_edges(view, &edges)
    }

    /// All nodes of `view` plus exactly the given edges.
    pub fn to_dot_with_edges(
        view: &GraphView,
        edges: &[(&FunctionName, &FunctionName, EdgeEmphasis)],
    ) -> String {
        let mut out = String::new();

        out.push_str("// Function Dependencies\n");
        out.push_str("digraph Dependencies {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    splines=ortho;\n");
        let _ = writeln!(out, "    bgcolor=\"{}\";", palette::BACKGROUND);
        out.push_str("    node [shape=box, style=filled, fontname=\"Arial\"];\n");
        let _ = writeln!(out, "    edge [color=\"{}\"];", palette::EDGE);
        out.push('\n');

        for name in view.metadata.keys() {
            let style = NodeStyle::for_metrics(&view.metrics_for(name));
            let label = format!("{}\n({} deps)", name, view.declared_dependencies(name));
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\", fillcolor=\"{}\", fontcolor=\"{}\"];",
                Self::escape(name),
                Self::escape(&label),
                style.fill(),
                style.font_color()
            );
        }

        if !edges.is_empty() {
            out.push('\n');
        }
        for (from, to, emphasis) in edges {
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\"{};",
                Self::escape(from),
                Self::escape(to),
                Self::edge_attrs(*emphasis)
            );
        }

        out.push_str("}\n");
        out
    }

    fn edge_attrs(emphasis: EdgeEmphasis) -> String {
        match emphasis {
            EdgeEmphasis::Normal => String::new(),
            EdgeEmphasis::Muted => format!(" [color=\"{}\"]", palette::MUTED_EDGE),
            EdgeEmphasis::Highlighted => {
                format!(" [color=\"{}\", penwidth=2.0]", palette::HIGHLIGHT_EDGE)
            }
        }
    }

    fn escape(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::DependencyMetadata;

    fn sample() -> DependencyMetadata {
        let mut m = DependencyMetadata::new();
        m.insert("main".to_string(), vec!["helper".to_string(), "ghost".to_string()]);
        m.insert("helper".to_string(), vec![]);
        m.insert("fact".to_string(), vec!["fact".to_string()]);
        m
    }

    #[test]
    fn test_to_dot() {
        let metadata = sample();
        let view = GraphView::new(&metadata);
        let dot = DotExporter::to_dot(&view);

        assert!(dot.contains("digraph Dependencies"));
        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("\"helper\" -> \"main\";"));
        assert!(dot.contains("\"fact\" -> \"fact\";"));
        assert!(!dot.contains("ghost\""));
        assert!(dot.contains("main\\n(2 deps)"));
        assert!(dot.contains(palette::RECURSIVE));
        assert!(dot.contains(palette::LEAF));
    }

    #[test]
    fn test_edge_emphasis() {
        let metadata = sample();
        let view = GraphView::new(&metadata);
        let helper = "helper".to_string();
        let main = "main".to_string();
        let fact = "fact".to_string();
        let dot = DotExporter::to_dot_with_edges(
            &view,
            &[
                (&helper, &main, EdgeEmphasis::Muted),
                (&fact, &fact, EdgeEmphasis::Highlighted),
            ],
        );
        assert!(dot.contains(&format!("\"helper\" -> \"main\" [color=\"{}\"]", palette::MUTED_EDGE)));
        assert!(dot.contains("penwidth=2.0"));
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(DotExporter::escape("a\"b\nc"), "a\\\"b\\nc");
    }
}
