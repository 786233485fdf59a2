use crate::types::PxRect;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    pub source_index: usize,
    /// Band of the source surface drawn on this page.
    pub band: Option<PxRect>,
    pub links_attached: usize,
    pub links_skipped: usize,
    pub links_clipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionMetrics {
    pub pages: Vec<PageMetrics>,
    pub capture_count: usize,
    pub capture_ms: f64,
    pub compose_ms: f64,
    pub total_bytes: usize,
    /// Raster rows dropped by `cut` overflow, summed over every capture.
    pub rows_cut: u64,
}

impl ConversionMetrics {
    pub fn links_attached(&self) -> usize {
        self.pages.iter().map(|page| page.links_attached).sum()
    }

    pub fn links_skipped(&self) -> usize {
        self.pages.iter().map(|page| page.links_skipped).sum()
    }
}
