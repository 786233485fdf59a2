use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::error::LinkAttachError;
use crate::metrics::PageMetrics;
use crate::render_set::{LinkRegion, RenderedNode};
use crate::slicer::{ContentArea, PageSlice};
use crate::types::{Pt, PxRect, Rect, Size};
use serde_json::json;

/// Where a slice image lands on its page, in output units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    /// Centers the scaled band horizontally in the content area and pins it
    /// to the top margin.
    pub fn for_slice(slice: &PageSlice, area: &ContentArea) -> Self {
        let width = (slice.band.width as f64 * slice.scale_ratio).round();
        let height = (slice.band.height as f64 * slice.scale_ratio).round();
        let x = area.left + ((area.width - width) / 2.0).floor().max(0.0);
        Self {
            x,
            y: area.top,
            width,
            height,
        }
    }
}

/// Outcome of projecting one link region onto a slice.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkProjection {
    Visible(Rect),
    /// Entirely above or below the slice band.
    Clipped,
}

/// Maps a node-relative link rectangle into page space for one slice.
/// Only the vertical extent is tested against the band; horizontal overflow
/// is carried through unchanged. Fails when any projected coordinate is NaN
/// or infinite.
pub fn project_link(
    region: &LinkRegion,
    pixel_scale: (f64, f64),
    slice: &PageSlice,
    placement: &Placement,
) -> Result<LinkProjection, LinkAttachError> {
    let (scale_x, scale_y) = pixel_scale;
    let left_px = region.rect.left * scale_x;
    let width_px = region.rect.width * scale_x;
    let height_px = region.rect.height * scale_y;
    let top_px = region.rect.top * scale_y - slice.band.y as f64;

    let ratio = slice.scale_ratio;
    let x = placement.x + (left_px * ratio).round();
    let y = placement.y + (top_px * ratio).round();
    let width = (width_px * ratio).round();
    let height = (height_px * ratio).round();
    if ![x, y, width, height].iter().all(|value| value.is_finite()) {
        return Err(LinkAttachError::NonFiniteRect);
    }

    if top_px + height_px <= 0.0 || top_px >= slice.band.height as f64 {
        return Ok(LinkProjection::Clipped);
    }
    Ok(LinkProjection::Visible(Rect::from_f32(
        x as f32,
        y as f32,
        width as f32,
        height as f32,
    )))
}

pub(crate) struct Composition {
    pub document: Document,
    pub pages: Vec<PageMetrics>,
}

/// Draws exactly one page per slice, in slice order, and re-attaches the
/// links of each slice's source node. Slices with an empty band still get
/// their (blank) page.
pub(crate) fn compose_pages(
    rendered: &[RenderedNode],
    slices: &[PageSlice],
    page_size: Size,
    area: &ContentArea,
    enable_links: bool,
    debug: Option<&DebugLogger>,
) -> Composition {
    let mut canvas = Canvas::new(page_size);
    let mut pages = Vec::with_capacity(slices.len());

    for (page_index, slice) in slices.iter().enumerate() {
        let metrics = compose_slice(
            &mut canvas,
            rendered,
            slice,
            page_index + 1,
            area,
            enable_links,
            debug,
        );
        canvas.show_page();
        pages.push(metrics);
    }

    Composition {
        document: canvas.finish(),
        pages,
    }
}

fn compose_slice(
    canvas: &mut Canvas,
    rendered: &[RenderedNode],
    slice: &PageSlice,
    page_number: usize,
    area: &ContentArea,
    enable_links: bool,
    debug: Option<&DebugLogger>,
) -> PageMetrics {
    let mut metrics = PageMetrics {
        page_number,
        source_index: slice.source_index,
        band: Some(slice.band),
        ..PageMetrics::default()
    };
    let Some(node) = rendered.get(slice.source_index) else {
        log::warn!("slice references missing render {}", slice.source_index);
        return metrics;
    };

    let placement = Placement::for_slice(slice, area);
    draw_band(canvas, node, slice.band, &placement);

    if enable_links {
        let pixel_scale = node.pixel_scale();
        for region in &node.link_regions {
            let attached = match project_link(region, pixel_scale, slice, &placement) {
                Ok(LinkProjection::Clipped) => {
                    metrics.links_clipped += 1;
                    continue;
                }
                Ok(LinkProjection::Visible(rect)) => canvas.add_link(rect, &region.target),
                Err(err) => Err(err),
            };
            match attached {
                Ok(()) => metrics.links_attached += 1,
                Err(err) => {
                    metrics.links_skipped += 1;
                    log::debug!("skipping link '{}': {}", region.target, err);
                    if let Some(logger) = debug {
                        logger.log_event(
                            "pipeline.link_skipped",
                            json!({
                                "page": page_number,
                                "target": region.target,
                                "reason": err.to_string(),
                            }),
                        );
                    }
                }
            }
        }
    }

    if let Some(logger) = debug {
        logger.log_event(
            "pipeline.page",
            json!({
                "page": page_number,
                "source": slice.source_index,
                "band_y": slice.band.y,
                "band_height": slice.band.height,
                "x": placement.x,
                "width": placement.width,
                "height": placement.height,
            }),
        );
        logger.increment("link.attached", metrics.links_attached as u64);
        logger.increment("link.skipped", metrics.links_skipped as u64);
        logger.increment("link.clipped", metrics.links_clipped as u64);
    }
    metrics
}

fn draw_band(canvas: &mut Canvas, node: &RenderedNode, band: PxRect, placement: &Placement) {
    if band.is_empty() {
        return;
    }
    let id = canvas.add_image(node.surface.crop(band));
    canvas.draw_image(
        Pt::from_f32(placement.x as f32),
        Pt::from_f32(placement.y as f32),
        Pt::from_f32(placement.width as f32),
        Pt::from_f32(placement.height as f32),
        id,
    );
}
