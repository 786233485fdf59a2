use crate::debug::DebugLogger;
use crate::error::PaperSliceError;
use crate::types::LayoutRect;
use crate::visual::{RasterSurface, Visual};
use serde_json::json;
use std::time::Instant;

/// Clickable area found under a captured node. `rect` is relative to the
/// node's own rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRegion {
    pub rect: LayoutRect,
    pub target: String,
}

/// One independently captured render.
#[derive(Debug, Clone)]
pub struct RenderedNode {
    /// Node rectangle at capture time (layout units).
    pub source_rect: LayoutRect,
    pub surface: RasterSurface,
    pub link_regions: Vec<LinkRegion>,
}

impl RenderedNode {
    /// Raster pixels per layout unit on each axis. Falls back to 1 for a
    /// zero-sized node.
    pub fn pixel_scale(&self) -> (f64, f64) {
        let axis = |pixels: u32, layout: f64| {
            if layout > 0.0 && layout.is_finite() {
                pixels as f64 / layout
            } else {
                1.0
            }
        };
        (
            axis(self.surface.width(), self.source_rect.width),
            axis(self.surface.height(), self.source_rect.height),
        )
    }
}

/// Hyperlinks under `node`, in document order, relative to `node`.
pub fn collect_link_regions<V: Visual>(node: &V) -> Vec<LinkRegion> {
    let origin = node.bounding_rect();
    node.descendants_matching(|candidate| {
        candidate.tag_name().eq_ignore_ascii_case("a") && candidate.attribute("href").is_some()
    })
    .into_iter()
    .filter_map(|anchor| {
        let target = anchor.attribute("href")?;
        Some(LinkRegion {
            rect: anchor.bounding_rect().relative_to(&origin),
            target,
        })
    })
    .collect()
}

pub(crate) struct RenderSet {
    pub nodes: Vec<RenderedNode>,
    pub capture_ms: f64,
}

/// Captures each node in order, one at a time. Link geometry is measured
/// before the capture so it matches the layout the surface was taken from.
pub(crate) fn build_render_set<V: Visual>(
    nodes: &[V],
    scale: f32,
    debug: Option<&DebugLogger>,
) -> Result<RenderSet, PaperSliceError> {
    let mut rendered = Vec::with_capacity(nodes.len());
    let mut capture_ms = 0.0;
    for (index, node) in nodes.iter().enumerate() {
        let link_regions = collect_link_regions(node);
        let source_rect = node.bounding_rect();
        let started = Instant::now();
        let surface = node.capture(scale)?;
        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        capture_ms += elapsed;
        if let Some(logger) = debug {
            logger.log_event(
                "pipeline.capture",
                json!({
                    "source": index,
                    "width_px": surface.width(),
                    "height_px": surface.height(),
                    "links": link_regions.len(),
                    "ms": elapsed,
                }),
            );
            logger.increment("capture.count", 1);
        }
        rendered.push(RenderedNode {
            source_rect,
            surface,
            link_regions,
        });
    }
    Ok(RenderSet {
        nodes: rendered,
        capture_ms,
    })
}
