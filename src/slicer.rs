use crate::error::PaperSliceError;
use crate::options::Overflow;
use crate::render_set::RenderedNode;
use crate::types::{Margins, PxRect, Size};

/// Page area left after margins, in output units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContentArea {
    pub fn new(page: Size, margins: Margins) -> Result<Self, PaperSliceError> {
        if margins.has_negative_side() {
            return Err(PaperSliceError::InvalidConfiguration(
                "margins must not be negative".to_string(),
            ));
        }
        let left = margins.left.to_f32() as f64;
        let top = margins.top.to_f32() as f64;
        let width = (page.width - margins.left - margins.right).to_f32() as f64;
        let height = (page.height - margins.top - margins.bottom).to_f32() as f64;
        if width <= 0.0 || height <= 0.0 {
            return Err(PaperSliceError::InvalidConfiguration(format!(
                "margins leave no content area ({}x{})",
                width, height
            )));
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }
}

/// One page worth of pixels taken from a captured surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlice {
    pub source_index: usize,
    /// Position of this slice among those cut from the same source.
    pub index_within_source: usize,
    pub band: PxRect,
    /// Output units per raster pixel, shared by every slice of the source.
    pub scale_ratio: f64,
}

pub fn scale_ratio(content_width: f64, surface_width: u32) -> f64 {
    if surface_width == 0 {
        return 1.0;
    }
    let ratio = content_width / surface_width as f64;
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

pub fn slice_height_px(content_height: f64, ratio: f64) -> u32 {
    let raw = (content_height / ratio).floor();
    if raw.is_finite() && raw >= 1.0 {
        raw.min(u32::MAX as f64) as u32
    } else {
        1
    }
}

/// Cuts one surface into page bands. Under `Cut` everything below the first
/// page is dropped.
pub fn slice_surface(
    source_index: usize,
    surface_width: u32,
    surface_height: u32,
    area: &ContentArea,
    overflow: Overflow,
) -> Vec<PageSlice> {
    let ratio = scale_ratio(area.width, surface_width);
    let step = slice_height_px(area.height, ratio);
    let slice = |index: usize, y: u32, height: u32| PageSlice {
        source_index,
        index_within_source: index,
        band: PxRect::band(y, surface_width, height),
        scale_ratio: ratio,
    };

    if surface_height <= step {
        return vec![slice(0, 0, surface_height)];
    }
    match overflow {
        Overflow::Cut => vec![slice(0, 0, step)],
        Overflow::Paginate => {
            let count = surface_height.div_ceil(step) as usize;
            (0..count)
                .map(|index| {
                    let y = index as u32 * step;
                    slice(index, y, step.min(surface_height - y))
                })
                .collect()
        }
    }
}

/// Slices each render independently, so overflow never spills from one
/// selected node into another's pages.
pub fn slice_render_set(
    rendered: &[RenderedNode],
    area: &ContentArea,
    overflow: Overflow,
) -> Vec<PageSlice> {
    rendered
        .iter()
        .enumerate()
        .flat_map(|(index, node)| {
            slice_surface(
                index,
                node.surface.width(),
                node.surface.height(),
                area,
                overflow,
            )
        })
        .collect()
}

/// Pixel rows of each render that no slice covers. Only `Cut` leaves any.
pub fn uncovered_rows(rendered: &[RenderedNode], slices: &[PageSlice]) -> u64 {
    rendered
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let covered: u64 = slices
                .iter()
                .filter(|slice| slice.source_index == index)
                .map(|slice| slice.band.height as u64)
                .sum();
            (node.surface.height() as u64).saturating_sub(covered)
        })
        .sum()
}
