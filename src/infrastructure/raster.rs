//! Native raster rendering of a dependency graph.
//!
//! Used for animation frames and as the PNG fallback when Graphviz is not
//! installed. Each related-functions group is laid out left to right by
//! dependency depth; group blocks are packed into shelves and the whole
//! layout is shrunk uniformly when it exceeds the requested canvas.

use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};

use crate::domain::graph::{related_functions, GraphView};
use crate::domain::metadata::FunctionName;
use crate::domain::style::{hex_to_rgb, palette, NodeStyle};
use crate::ports::dot_exporter::EdgeEmphasis;

const CELL_W: i64 = 200;
const CELL_H: i64 = 70;
const NODE_W: i64 = 170;
const NODE_H: i64 = 36;
const MARGIN: i64 = 30;
const GROUP_GAP: i64 = 30;
const GLYPH_SCALE: i64 = 2;
const ARROW_LENGTH: f64 = 10.0;
// shelf packing aims for the animation frame's aspect ratio
const TARGET_ASPECT: f64 = 1.6;

/// Largest side of a standalone rendered image.
pub const MAX_DIMENSION: u32 = 8_192;

/// Node centers and drawing sizes for one graph view.
#[derive(Debug, Clone)]
pub struct RasterLayout {
    positions: BTreeMap<FunctionName, (i64, i64)>,
    width: i64,
    height: i64,
    scale: f64,
    node_w: i64,
    node_h: i64,
    glyph: i64,
}

struct GroupBlock<'a> {
    cells: Vec<(&'a FunctionName, i64, i64)>,
    width: i64,
    height: i64,
}

impl RasterLayout {
    pub fn compute(view: &GraphView) -> Self {
        Self::fit(view, MAX_DIMENSION, MAX_DIMENSION)
    }

    /// Layout at natural size, shrunk uniformly until it fits within
    /// `max_width` x `max_height`.
    pub fn fit(view: &GraphView, max_width: u32, max_height: u32) -> Self {
        let layers = view.graph.layers();
        let groups = related_functions(view.metadata);

        let blocks: Vec<GroupBlock> = groups
            .iter()
            .map(|group| {
                let mut columns: BTreeMap<usize, Vec<&FunctionName>> = BTreeMap::new();
                for name in group {
                    let layer = layers.get(name).copied().unwrap_or(0);
                    columns.entry(layer).or_default().push(name);
                }
                let mut cells = Vec::with_capacity(group.len());
                let mut cols = 1;
                let mut rows = 1;
                for (layer, names) in &columns {
                    let col = *layer as i64;
                    for (row, name) in names.iter().enumerate() {
                        cells.push((*name, col, row as i64));
                    }
                    cols = cols.max(col + 1);
                    rows = rows.max(names.len() as i64);
                }
                GroupBlock {
                    cells,
                    width: cols * CELL_W,
                    height: rows * CELL_H,
                }
            })
            .collect();

        let area: i64 = blocks.iter().map(|b| b.width * b.height).sum();
        let widest = blocks.iter().map(|b| b.width).max().unwrap_or(CELL_W);
        let shelf_width = widest.max(((area as f64) * TARGET_ASPECT).sqrt() as i64);

        let mut positions = BTreeMap::new();
        let (mut x, mut y) = (0_i64, 0_i64);
        let mut shelf_height = 0;
        let mut used_width = CELL_W;
        for block in &blocks {
            if x > 0 && x + block.width > shelf_width {
                y += shelf_height + GROUP_GAP;
                x = 0;
                shelf_height = 0;
            }
            for (name, col, row) in &block.cells {
                let cx = MARGIN + x + col * CELL_W + CELL_W / 2;
                let cy = MARGIN + y + row * CELL_H + CELL_H / 2;
                positions.insert((*name).clone(), (cx, cy));
            }
            used_width = used_width.max(x + block.width);
            shelf_height = shelf_height.max(block.height);
            x += block.width + GROUP_GAP;
        }
        let natural_w = MARGIN * 2 + used_width;
        let natural_h = MARGIN * 2 + (y + shelf_height).max(CELL_H);

        let scale = 1.0_f64
            .min(f64::from(max_width.max(1)) / natural_w as f64)
            .min(f64::from(max_height.max(1)) / natural_h as f64);
        let shrink = |v: i64| (v as f64 * scale).round() as i64;
        for center in positions.values_mut() {
            *center = (shrink(center.0), shrink(center.1));
        }

        Self {
            positions,
            width: shrink(natural_w).clamp(1, i64::from(max_width.max(1))),
            height: shrink(natural_h).clamp(1, i64::from(max_height.max(1))),
            scale,
            node_w: shrink(NODE_W).max(2),
            node_h: shrink(NODE_H).max(2),
            // labels vanish once a glyph pixel would drop below one device pixel
            glyph: (GLYPH_SCALE as f64 * scale).floor() as i64,
        }
    }

    pub fn position(&self, name: &str) -> Option<(i64, i64)> {
        self.positions.get(name).copied()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// Draw every node of `view` plus exactly the given edges.
pub fn render(
    view: &GraphView,
    layout: &RasterLayout,
    edges: &[(&FunctionName, &FunctionName, EdgeEmphasis)],
) -> RgbaImage {
    let (width, height) = layout.dimensions();
    let mut canvas = RgbaImage::from_pixel(width, height, color(palette::BACKGROUND));

    for (from, to, emphasis) in edges {
        let (Some(a), Some(b)) = (layout.position(from), layout.position(to)) else {
            continue;
        };
        let (stroke, thickness) = match emphasis {
            EdgeEmphasis::Normal => (color(palette::EDGE), 1),
            EdgeEmphasis::Muted => (color(palette::MUTED_EDGE), 1),
            EdgeEmphasis::Highlighted => (color(palette::HIGHLIGHT_EDGE), 3),
        };
        if from == to {
            draw_self_loop(&mut canvas, layout, a, stroke, thickness);
        } else {
            draw_edge(&mut canvas, layout, a, b, stroke, thickness);
        }
    }

    for name in view.metadata.keys() {
        if let Some(center) = layout.position(name) {
            let style = NodeStyle::for_metrics(&view.metrics_for(name));
            draw_node(&mut canvas, layout, center, name, style);
        }
    }

    canvas
}

/// The complete graph with every edge in normal style.
pub fn render_full(view: &GraphView) -> RgbaImage {
    let layout = RasterLayout::compute(view);
    let edges: Vec<_> = view
        .graph
        .edge_sequence()
        .iter()
        .map(|(from, to)| (from, to, EdgeEmphasis::Normal))
        .collect();
    render(view, &layout, &edges)
}

fn color(hex: &str) -> Rgba<u8> {
    let [r, g, b] = hex_to_rgb(hex).unwrap_or([255, 255, 255]);
    Rgba([r, g, b, 255])
}

fn put(canvas: &mut RgbaImage, x: i64, y: i64, pixel: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, pixel);
    }
}

fn fill_rect(canvas: &mut RgbaImage, x0: i64, y0: i64, w: i64, h: i64, pixel: Rgba<u8>) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            put(canvas, x, y, pixel);
        }
    }
}

fn draw_line(canvas: &mut RgbaImage, from: (i64, i64), to: (i64, i64), pixel: Rgba<u8>, thickness: i64) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = thickness / 2;

    loop {
        fill_rect(canvas, x - half, y - half, thickness, thickness, pixel);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_edge(
    canvas: &mut RgbaImage,
    layout: &RasterLayout,
    from: (i64, i64),
    to: (i64, i64),
    pixel: Rgba<u8>,
    thickness: i64,
) {
    // leave from the right side, enter from the left, unless the target sits
    // in an earlier column
    let (start, end) = if to.0 > from.0 {
        ((from.0 + layout.node_w / 2, from.1), (to.0 - layout.node_w / 2, to.1))
    } else {
        ((from.0, from.1 + layout.node_h / 2), (to.0, to.1 - layout.node_h / 2))
    };
    draw_line(canvas, start, end, pixel, thickness);
    draw_arrow_head(canvas, layout, start, end, pixel, thickness);
}

fn draw_arrow_head(
    canvas: &mut RgbaImage,
    layout: &RasterLayout,
    start: (i64, i64),
    tip: (i64, i64),
    pixel: Rgba<u8>,
    thickness: i64,
) {
    let angle = ((tip.1 - start.1) as f64).atan2((tip.0 - start.0) as f64);
    let length = (ARROW_LENGTH * layout.scale).max(3.0);
    for offset in [0.45_f64, -0.45] {
        let a = angle + std::f64::consts::PI + offset;
        let wing = (
            tip.0 + (length * a.cos()).round() as i64,
            tip.1 + (length * a.sin()).round() as i64,
        );
        draw_line(canvas, tip, wing, pixel, thickness);
    }
}

fn draw_self_loop(
    canvas: &mut RgbaImage,
    layout: &RasterLayout,
    center: (i64, i64),
    pixel: Rgba<u8>,
    thickness: i64,
) {
    let top = center.1 - layout.node_h / 2;
    let left = center.0 + layout.node_w / 4;
    let right = center.0 + layout.node_w / 2 - layout.node_w / 20;
    let peak = top - (layout.node_h * 2 / 5).max(2);
    draw_line(canvas, (left, top), (left, peak), pixel, thickness);
    draw_line(canvas, (left, peak), (right, peak), pixel, thickness);
    draw_line(canvas, (right, peak), (right, top), pixel, thickness);
    draw_arrow_head(canvas, layout, (right, peak), (right, top), pixel, thickness);
}

fn draw_node(canvas: &mut RgbaImage, layout: &RasterLayout, center: (i64, i64), name: &str, style: NodeStyle) {
    let (w, h) = (layout.node_w, layout.node_h);
    let x0 = center.0 - w / 2;
    let y0 = center.1 - h / 2;
    fill_rect(canvas, x0, y0, w, h, color(palette::EDGE));
    fill_rect(canvas, x0 + 1, y0 + 1, w - 2, h - 2, color(style.fill()));

    let scale = layout.glyph;
    if scale == 0 {
        return;
    }
    let advance = 4 * scale;
    let max_chars = ((w - 4 * scale) / advance).max(0) as usize;
    let label: String = if name.chars().count() > max_chars {
        let mut short: String = name.chars().take(max_chars.saturating_sub(1)).collect();
        short.push('.');
        short
    } else {
        name.to_string()
    };
    let text_w = label.chars().count() as i64 * advance - scale;
    let text_x = center.0 - text_w / 2;
    let text_y = center.1 - 5 * scale / 2;
    draw_text(canvas, text_x, text_y, scale, &label, color(style.font_color()));
}

fn draw_text(canvas: &mut RgbaImage, x: i64, y: i64, scale: i64, text: &str, pixel: Rgba<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = glyph(ch) else {
            continue;
        };
        let gx = x + i as i64 * 4 * scale;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    fill_rect(canvas, gx + col * scale, y + row as i64 * scale, scale, scale, pixel);
                }
            }
        }
    }
}

/// 3x5 bitmap glyphs, one row per byte, most significant of three bits leftmost.
/// Letters are case-folded.
fn glyph(ch: char) -> Option<[u8; 5]> {
    let rows = match ch.to_ascii_uppercase() {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b110, 0b001, 0b010, 0b100, 0b111],
        '3' => [0b110, 0b001, 0b010, 0b001, 0b110],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b110, 0b001, 0b110],
        '6' => [0b011, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b110],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::DependencyMetadata;

    fn sample() -> DependencyMetadata {
        let mut m = DependencyMetadata::new();
        m.insert("main".to_string(), vec!["helper".to_string()]);
        m.insert("helper".to_string(), vec!["util".to_string()]);
        m.insert("util".to_string(), vec![]);
        m.insert("alone".to_string(), vec!["alone".to_string()]);
        m
    }

    #[test]
    fn test_layout_places_every_node_once() {
        let metadata = sample();
        let view = GraphView::new(&metadata);
        let layout = RasterLayout::compute(&view);

        let util = layout.position("util").unwrap();
        let helper = layout.position("helper").unwrap();
        let main = layout.position("main").unwrap();
        // dependencies sit left of their dependents
        assert!(util.0 < helper.0);
        assert!(helper.0 < main.0);
        assert!(layout.position("alone").is_some());

        let (w, h) = layout.dimensions();
        for name in metadata.keys() {
            let (x, y) = layout.position(name).unwrap();
            assert!(x > 0 && (x as u32) < w);
            assert!(y > 0 && (y as u32) < h);
        }
    }

    #[test]
    fn test_render_colors_nodes_by_style() {
        let metadata = sample();
        let view = GraphView::new(&metadata);
        let layout = RasterLayout::compute(&view);
        let image = render(&view, &layout, &[]);

        // sample just inside the top-left corner of a node, clear of its label
        let (x, y) = layout.position("alone").unwrap();
        let px = image.get_pixel((x - NODE_W / 2 + 3) as u32, (y - NODE_H / 2 + 3) as u32);
        assert_eq!(*px, color(palette::RECURSIVE));
        let (x, y) = layout.position("util").unwrap();
        let px = image.get_pixel((x - NODE_W / 2 + 3) as u32, (y - NODE_H / 2 + 3) as u32);
        assert_eq!(*px, color(palette::LEAF));
    }

    #[test]
    fn test_highlighted_edge_is_drawn() {
        let metadata = sample();
        let view = GraphView::new(&metadata);
        let layout = RasterLayout::compute(&view);
        let util = "util".to_string();
        let helper = "helper".to_string();
        let image = render(&view, &layout, &[(&util, &helper, EdgeEmphasis::Highlighted)]);

        let red = color(palette::HIGHLIGHT_EDGE);
        assert!(image.pixels().any(|p| *p == red));
        let plain = render(&view, &layout, &[]);
        assert!(!plain.pixels().any(|p| *p == red));
    }

    fn isolated(count: usize) -> DependencyMetadata {
        (0..count).map(|i| (format!("f{}", i), Vec::new())).collect()
    }

    fn chain(depth: usize) -> DependencyMetadata {
        (0..depth)
            .map(|i| {
                let deps = if i == 0 { vec![] } else { vec![format!("c{}", i - 1)] };
                (format!("c{}", i), deps)
            })
            .collect()
    }

    fn assert_inside(layout: &RasterLayout, metadata: &DependencyMetadata) {
        let (w, h) = layout.dimensions();
        for name in metadata.keys() {
            let (x, y) = layout.position(name).unwrap();
            assert!(x >= 0 && (x as u32) < w, "{} at x={} outside {}", name, x, w);
            assert!(y >= 0 && (y as u32) < h, "{} at y={} outside {}", name, y, h);
        }
    }

    #[test]
    fn test_many_unrelated_groups_wrap_into_shelves() {
        let metadata = isolated(200);
        let view = GraphView::new(&metadata);
        let layout = RasterLayout::compute(&view);

        let (w, h) = layout.dimensions();
        assert!(w <= MAX_DIMENSION && h <= MAX_DIMENSION);
        // wrapped rather than stacked in a single column
        assert!(w > CELL_W as u32 * 2);
        assert_eq!(layout.scale(), 1.0);
        assert_inside(&layout, &metadata);

        let distinct: std::collections::BTreeSet<_> =
            metadata.keys().map(|n| layout.position(n).unwrap()).collect();
        assert_eq!(distinct.len(), 200);
    }

    #[test]
    fn test_deep_chain_is_shrunk_to_fit() {
        let metadata = chain(90);
        let view = GraphView::new(&metadata);
        let layout = RasterLayout::compute(&view);

        let (w, h) = layout.dimensions();
        assert!(w <= MAX_DIMENSION && h <= MAX_DIMENSION);
        assert!(layout.scale() < 1.0);
        assert_inside(&layout, &metadata);
        assert!(layout.position("c0").unwrap().0 < layout.position("c89").unwrap().0);

        let image = render_full(&view);
        assert_eq!(image.dimensions(), (w, h));
    }

    #[test]
    fn test_fit_respects_small_canvas() {
        let metadata = isolated(500);
        let view = GraphView::new(&metadata);
        let layout = RasterLayout::fit(&view, 1600, 1000);

        let (w, h) = layout.dimensions();
        assert!(w <= 1600 && h <= 1000);
        assert_inside(&layout, &metadata);
        let image = render(&view, &layout, &[]);
        assert_eq!(image.dimensions(), (w, h));
    }

    #[test]
    fn test_unknown_glyphs_are_skipped() {
        assert!(glyph('a').is_some());
        assert!(glyph('Z').is_some());
        assert!(glyph('λ').is_none());
    }
}
