//! Interactive HTML rendering backed by vis-network.
//!
//! The graph data is embedded in the page; the vis-network script itself is
//! fetched from the CDN when the page is opened.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::domain::graph::GraphView;
use crate::domain::style::{gradient_color, palette};
use crate::ports::{artifact_path, GraphExporter};

const VIS_NETWORK_URL: &str = "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js";

#[derive(Debug, Serialize)]
struct HtmlNode {
    id: String,
    label: String,
    title: String,
    size: f64,
    color: String,
}

#[derive(Debug, Serialize)]
struct HtmlEdge {
    from: String,
    to: String,
    arrows: &'static str,
}

pub struct InteractiveGraphExporter;

impl InteractiveGraphExporter {
    fn tooltip(view: &GraphView, name: &str) -> String {
        let metrics = view.metrics_for(name);
        format!(
            "Function: {}\nDependencies: {}\nUsed by: {}\nType: {}",
            name,
            metrics.out_degree,
            metrics.in_degree,
            if metrics.is_recursive { "Recursive" } else { "Normal" }
        )
    }

    /// Node size grows with raw importance.
    fn node_size(view: &GraphView, name: &str) -> f64 {
        25.0 + view.metrics_for(name).importance() as f64 * 5.0
    }

    pub fn to_html(view: &GraphView) -> Result<String> {
        let nodes: Vec<HtmlNode> = view
            .metadata
            .keys()
            .map(|name| HtmlNode {
                id: name.clone(),
                label: name.clone(),
                title: Self::tooltip(view, name),
                size: Self::node_size(view, name),
                color: gradient_color(view.importance(name)),
            })
            .collect();
        let edges: Vec<HtmlEdge> = view
            .graph
            .edge_sequence()
            .iter()
            .map(|(from, to)| HtmlEdge {
                from: from.clone(),
                to: to.clone(),
                arrows: "to",
            })
            .collect();

        let nodes_json = script_safe(&serde_json::to_string(&nodes)?);
        let edges_json = script_safe(&serde_json::to_string(&edges)?);

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Function Dependencies</title>
<script type="text/javascript" src="{url}"></script>
<style>
  #graph {{ width: 100%; height: 900px; background-color: {background}; border: 1px solid lightgray; }}
</style>
</head>
<body>
<div id="graph"></div>
<script type="text/javascript">
  var nodes = new vis.DataSet({nodes});
  var edges = new vis.DataSet({edges});
  var options = {{
    "physics": {{
      "solver": "forceAtlas2Based",
      "forceAtlas2Based": {{
        "gravitationalConstant": -50,
        "centralGravity": 0.01,
        "springLength": 100
      }}
    }},
    "edges": {{ "color": "{edge}" }},
    "interaction": {{ "hover": true }}
  }};
  var network = new vis.Network(document.getElementById("graph"), {{ nodes: nodes, edges: edges }}, options);
</script>
</body>
</html>
"#,
            url = VIS_NETWORK_URL,
            background = palette::BACKGROUND,
            edge = palette::EDGE,
            nodes = nodes_json,
            edges = edges_json,
        ))
    }
}

/// Keep embedded JSON from closing the surrounding script element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

impl GraphExporter for InteractiveGraphExporter {
    fn export(&self, view: &GraphView, base: &Path) -> Result<Option<PathBuf>> {
        if view.is_empty() {
            return Ok(None);
        }
        let output = artifact_path(base, ".html");
        fs::write(&output, Self::to_html(view)?)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Interactive visualization saved to {}", output.display());
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::DependencyMetadata;

    fn extract_array<'a>(html: &'a str, marker: &str) -> &'a str {
        let start = html.find(marker).unwrap() + marker.len();
        let end = html[start..].find(");").unwrap();
        &html[start..start + end]
    }

    #[test]
    fn test_nodes_sized_and_described() {
        let mut metadata = DependencyMetadata::new();
        metadata.insert("main".to_string(), vec!["helper".to_string()]);
        metadata.insert("helper".to_string(), vec!["helper".to_string()]);
        let view = GraphView::new(&metadata);
        let html = InteractiveGraphExporter::to_html(&view).unwrap();

        let nodes: serde_json::Value =
            serde_json::from_str(extract_array(&html, "var nodes = new vis.DataSet(")).unwrap();
        let helper = nodes
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["id"] == "helper")
            .unwrap();
        // in 2 (main and itself), out 1
        assert_eq!(helper["size"], 40.0);
        let title = helper["title"].as_str().unwrap();
        assert!(title.contains("Used by: 2"));
        assert!(title.contains("Type: Recursive"));

        let edges: serde_json::Value =
            serde_json::from_str(extract_array(&html, "var edges = new vis.DataSet(")).unwrap();
        assert_eq!(edges.as_array().unwrap().len(), 2);
        assert!(html.contains("forceAtlas2Based"));
        assert!(html.contains("900px"));
    }

    #[test]
    fn test_edgeless_graph_uses_baseline_color() {
        let mut metadata = DependencyMetadata::new();
        metadata.insert("solo".to_string(), vec!["missing".to_string()]);
        let view = GraphView::new(&metadata);
        let html = InteractiveGraphExporter::to_html(&view).unwrap();
        assert!(html.contains(palette::NO_DEPS));
    }

    #[test]
    fn test_page_embeds_data_and_loads_library_from_cdn() {
        let mut metadata = DependencyMetadata::new();
        metadata.insert("main".to_string(), vec![]);
        let view = GraphView::new(&metadata);
        let html = InteractiveGraphExporter::to_html(&view).unwrap();

        assert!(html.contains(&format!("src=\"{}\"", VIS_NETWORK_URL)));
        assert_eq!(html.matches(" src=").count(), 1);
        assert!(extract_array(&html, "var nodes = new vis.DataSet(").contains("\"main\""));
    }

    #[test]
    fn test_script_safe() {
        assert_eq!(script_safe(r#"["</script>"]"#), r#"["<\/script>"]"#);
    }
}
