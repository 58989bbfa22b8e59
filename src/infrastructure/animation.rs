//! Animated dependency flow.
//!
//! Edges appear one per frame in [`DependencyGraph::edge_sequence`] order:
//! the newest edge highlighted, earlier ones muted.
//!
//! [`DependencyGraph::edge_sequence`]: crate::domain::graph::DependencyGraph::edge_sequence

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame, RgbaImage};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::domain::graph::GraphView;
use crate::domain::metadata::FunctionName;
use crate::infrastructure::raster::{self, RasterLayout};
use crate::ports::dot_exporter::EdgeEmphasis;
use crate::ports::{artifact_path, GraphExporter};

pub const FRAME_WIDTH: u32 = 800;
pub const FRAME_HEIGHT: u32 = 500;
pub const FRAME_DELAY_MS: u32 = 1000;
// frames are drawn at this multiple of the output size, then downsampled
const OVERSAMPLE: u32 = 2;

pub struct AnimatedFlowExporter;

type FrameEdges<'a> = Vec<(&'a FunctionName, &'a FunctionName, EdgeEmphasis)>;

impl AnimatedFlowExporter {
    /// Edge lists for every frame: nodes only, one per added edge, then the
    /// complete graph with all edges muted. Built lazily, one frame at a time.
    pub fn frame_plan<'a>(view: &'a GraphView) -> impl Iterator<Item = FrameEdges<'a>> + 'a {
        let sequence = view.graph.edge_sequence();
        let growing = (0..sequence.len()).map(move |current| {
            sequence[..=current]
                .iter()
                .enumerate()
                .map(|(i, (from, to))| {
                    let emphasis = if i == current {
                        EdgeEmphasis::Highlighted
                    } else {
                        EdgeEmphasis::Muted
                    };
                    (from, to, emphasis)
                })
                .collect::<FrameEdges<'a>>()
        });
        let complete = std::iter::once_with(move || {
            sequence
                .iter()
                .map(|(from, to)| (from, to, EdgeEmphasis::Muted))
                .collect::<FrameEdges<'a>>()
        });
        std::iter::once(FrameEdges::new()).chain(growing).chain(complete)
    }

    /// Render one frame, round-trip it through a PNG in `frames_dir` and
    /// scale it onto the fixed canvas.
    fn render_frame(
        view: &GraphView,
        layout: &RasterLayout,
        edges: &FrameEdges,
        frames_dir: &Path,
        index: usize,
    ) -> Result<RgbaImage> {
        let frame_path = frames_dir.join(format!("frame_{:03}.png", index));
        raster::render(view, layout, edges)
            .save(&frame_path)
            .with_context(|| format!("Failed to save frame {}", frame_path.display()))?;

        let reloaded = image::open(&frame_path)
            .with_context(|| format!("Failed to reload frame {}", frame_path.display()))?
            .to_rgba8();
        fs::remove_file(&frame_path)
            .with_context(|| format!("Failed to remove frame {}", frame_path.display()))?;
        Ok(imageops::resize(
            &reloaded,
            FRAME_WIDTH,
            FRAME_HEIGHT,
            FilterType::Lanczos3,
        ))
    }
}

impl GraphExporter for AnimatedFlowExporter {
    fn export(&self, view: &GraphView, base: &Path) -> Result<Option<PathBuf>> {
        if view.is_empty() {
            return Ok(None);
        }

        let output = artifact_path(base, "_flow.gif");
        let out_dir = output.parent().unwrap_or_else(|| Path::new("."));

        // removed on drop, including on every early return below
        let frames_dir = TempDir::new().context("Failed to create frame directory")?;
        let layout = RasterLayout::fit(view, FRAME_WIDTH * OVERSAMPLE, FRAME_HEIGHT * OVERSAMPLE);

        let staged = NamedTempFile::new_in(out_dir)
            .with_context(|| format!("Failed to stage {}", output.display()))?;
        let mut writer = BufWriter::new(staged.as_file());
        let mut written = 0;
        {
            let mut encoder = GifEncoder::new(&mut writer);
            encoder.set_repeat(Repeat::Infinite)?;
            // one frame in memory at a time
            for (index, edges) in Self::frame_plan(view).enumerate() {
                let buffer = Self::render_frame(view, &layout, &edges, frames_dir.path(), index)?;
                encoder
                    .encode_frame(Frame::from_parts(
                        buffer,
                        0,
                        0,
                        Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1),
                    ))
                    .context("Failed to encode animation")?;
                written += 1;
            }
        }
        writer.flush().context("Failed to flush animation")?;
        drop(writer);
        debug!("Encoded {} animation frames", written);

        staged
            .persist(&output)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        info!("Animated flow visualization saved to {}", output.display());
        Ok(Some(output))
    }
}
