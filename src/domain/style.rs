// Visual styling shared by every renderer, so the static, interactive and
// animated views color a given node the same way.

use crate::domain::graph::NodeMetrics;

/// Hex colors of the dependency views.
pub mod palette {
    pub const NO_DEPS: &str = "#4a90e2";
    pub const HAS_DEPS: &str = "#f5a623";
    pub const RECURSIVE: &str = "#d0021b";
    pub const LEAF: &str = "#7ed321";
    pub const BACKGROUND: &str = "#ffffff";
    pub const EDGE: &str = "#2d3436";
    pub const TEXT: &str = "#2c3e50";
    pub const MUTED_EDGE: &str = "#9e9e9e";
    pub const HIGHLIGHT_EDGE: &str = "#e53935";
}

/// Node category derived from its metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStyle {
    Recursive,
    Leaf,
    Default,
}

impl NodeStyle {
    pub fn for_metrics(metrics: &NodeMetrics) -> Self {
        if metrics.is_recursive {
            NodeStyle::Recursive
        } else if metrics.out_degree == 0 {
            NodeStyle::Leaf
        } else {
            NodeStyle::Default
        }
    }

    pub fn fill(&self) -> &'static str {
        match self {
            NodeStyle::Recursive => palette::RECURSIVE,
            NodeStyle::Leaf => palette::LEAF,
            NodeStyle::Default => palette::HAS_DEPS,
        }
    }

    pub fn font_color(&self) -> &'static str {
        match self {
            NodeStyle::Recursive => "white",
            _ => palette::TEXT,
        }
    }
}

/// Blue-to-red gradient over normalized importance. `None` means the graph
/// has no edges at all and gets the fixed baseline color.
pub fn gradient_color(importance: Option<f64>) -> String {
    let Some(ratio) = importance else {
        return palette::NO_DEPS.to_string();
    };
    let ratio = ratio.clamp(0.0, 1.0);
    let hue = 0.6 - ratio * 0.4;
    let saturation = 0.6 + ratio * 0.4;
    let (r, g, b) = hsv_to_rgb(hue, saturation, 0.9);
    format!(
        "#{:02x}{:02x}{:02x}",
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8
    )
}

/// Parse `#rrggbb` into RGB bytes. Named colors are not supported.
pub fn hex_to_rgb(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_precedence() {
        let recursive_leaf = NodeMetrics { in_degree: 1, out_degree: 0, is_recursive: true };
        assert_eq!(NodeStyle::for_metrics(&recursive_leaf), NodeStyle::Recursive);
        let leaf = NodeMetrics { in_degree: 2, out_degree: 0, is_recursive: false };
        assert_eq!(NodeStyle::for_metrics(&leaf).fill(), palette::LEAF);
        let inner = NodeMetrics { in_degree: 0, out_degree: 3, is_recursive: false };
        assert_eq!(NodeStyle::for_metrics(&inner).fill(), palette::HAS_DEPS);
    }

    #[test]
    fn test_gradient_endpoints() {
        assert_eq!(gradient_color(None), palette::NO_DEPS);
        let low = hex_to_rgb(&gradient_color(Some(0.0))).unwrap();
        let high = hex_to_rgb(&gradient_color(Some(1.0))).unwrap();
        // low end is blue-dominant, high end red-dominant
        assert!(low[2] > low[0]);
        assert!(high[0] > high[2]);
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#d0021b"), Some([0xd0, 0x02, 0x1b]));
        assert_eq!(hex_to_rgb("white"), None);
        assert_eq!(hex_to_rgb("#fff"), None);
    }
}
