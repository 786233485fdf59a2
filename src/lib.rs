mod canvas;
mod compositor;
mod debug;
mod error;
mod footer;
mod metrics;
mod options;
mod output;
mod pdf;
mod pdfinspect;
mod render_set;
mod select;
mod slicer;
#[cfg(test)]
mod test_support;
mod types;
mod visual;

pub use canvas::{Canvas, Command, Document, ImageResource, LinkAnnotation, Page};
pub use compositor::{LinkProjection, Placement, project_link};
use debug::DebugLogger;
pub use error::{LinkAttachError, PaperSliceError};
pub use footer::{apply_page_numbers, label_origin, label_width, page_label};
pub use metrics::{ConversionMetrics, PageMetrics};
pub use options::{
    ConvertOptions, DEFAULT_CAPTURE_SCALE, DEFAULT_CLASS_SELECTOR, DEFAULT_FILENAME,
    DEFAULT_TAG_SELECTOR, MarginSides, OptionsBuilder, Orientation, OutputChannel, Overflow,
    PageBreakMode, PageFormat, PageNumberPosition, PaperSize, Trigger,
};
pub use output::{Delivery, PrintJob, dispatch, normalize_filename, preview_uri};
pub use pdf::document_to_pdf;
pub use pdfinspect::{
    PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes, inspect_pdf_path,
};
pub use render_set::{LinkRegion, RenderedNode, collect_link_regions};
pub use select::select_nodes;
pub use slicer::{
    ContentArea, PageSlice, scale_ratio, slice_height_px, slice_render_set, slice_surface,
    uncovered_rows,
};
pub use types::{Color, LayoutRect, Margins, Pt, PxRect, Rect, Size};
pub use visual::{Content, NodeMatcher, RasterSurface, Stage, StagedNode, Visual};

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Result of a full conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: Document,
    pub pdf: Vec<u8>,
    pub metrics: ConversionMetrics,
    /// Non-fatal problems the caller should surface.
    pub warnings: Vec<String>,
    pub delivery: Delivery,
}

/// Conversion engine bound to one validated option set.
pub struct PaperSlice {
    options: ConvertOptions,
    page_size: Size,
    area: ContentArea,
    download_dir: PathBuf,
    debug: Option<Arc<DebugLogger>>,
}

#[derive(Clone)]
pub struct PaperSliceBuilder {
    options: ConvertOptions,
    download_dir: PathBuf,
    debug_path: Option<PathBuf>,
}

impl PaperSlice {
    pub fn builder() -> PaperSliceBuilder {
        PaperSliceBuilder::new()
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn content_area(&self) -> ContentArea {
        self.area
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }

    /// Selects, captures, slices and composes `content` into a paged
    /// document. Off-screen nodes created on `stage` are released before
    /// this returns, whether it succeeds or not.
    pub fn render_document<S: Stage>(
        &self,
        stage: &S,
        content: Option<Content<'_, S::Node>>,
    ) -> Result<(Document, ConversionMetrics), PaperSliceError> {
        let result = self.render(stage, content);
        self.emit_debug_summary("render_document");
        result
    }

    /// Renders `content` and delivers the PDF through the configured channel.
    pub fn convert<S: Stage>(
        &self,
        stage: &S,
        content: Option<Content<'_, S::Node>>,
    ) -> Result<Conversion, PaperSliceError> {
        let result = self.convert_inner(stage, content);
        self.emit_debug_summary("convert");
        result
    }

    fn convert_inner<S: Stage>(
        &self,
        stage: &S,
        content: Option<Content<'_, S::Node>>,
    ) -> Result<Conversion, PaperSliceError> {
        let (document, mut metrics) = self.render(stage, content)?;
        let title = normalize_filename(&self.options.filename);
        let pdf = document_to_pdf(&document, Some(&title))
            .map_err(|err| PaperSliceError::Image(err.to_string()))?;
        metrics.total_bytes = pdf.len();

        let mut warnings = Vec::new();
        if let Some(raw) = self.options.unknown_output.as_deref() {
            let message = format!("unknown output channel '{raw}', using iframe preview");
            log::warn!("{}", message);
            warnings.push(message);
        }
        if metrics.rows_cut > 0 {
            let message = format!(
                "overflow 'cut' dropped {} pixel rows that did not fit on a page",
                metrics.rows_cut
            );
            log::warn!("{}", message);
            warnings.push(message);
        }
        let delivery = dispatch(
            self.options.output,
            &pdf,
            &self.options.filename,
            &self.download_dir,
        )?;

        Ok(Conversion {
            document,
            pdf,
            metrics,
            warnings,
            delivery,
        })
    }

    fn render<S: Stage>(
        &self,
        stage: &S,
        content: Option<Content<'_, S::Node>>,
    ) -> Result<(Document, ConversionMetrics), PaperSliceError> {
        let content = content.ok_or(PaperSliceError::NoContent)?;
        let mounted = match content {
            Content::Markup(markup) if markup.trim().is_empty() => {
                return Err(PaperSliceError::NoContent);
            }
            Content::Markup(markup) => Some(StagedNode::new(stage, stage.mount_markup(markup)?)),
            Content::Node(_) => None,
        };
        let root = match (content, &mounted) {
            (Content::Node(node), _) => node,
            (Content::Markup(_), Some(staged)) => staged.node(),
            (Content::Markup(_), None) => return Err(PaperSliceError::NoContent),
        };

        // Measurements and captures run against a width-pinned clone.
        let width = root.bounding_rect().width;
        let clone = StagedNode::new(stage, stage.clone_offscreen(root, width)?);
        let debug = self.debug.as_deref();

        let mode = self.options.page_break_mode;
        let selector = self.options.effective_selector();
        let nodes = select_nodes(clone.node(), mode, selector);
        if let Some(logger) = debug {
            logger.log_event(
                "pipeline.select",
                json!({
                    "mode": mode.as_str(),
                    "selector": selector,
                    "nodes": nodes.len(),
                }),
            );
        }

        let captured = render_set::build_render_set(&nodes, self.options.capture_scale, debug)?;
        drop(nodes);
        drop(clone);
        drop(mounted);

        let compose_started = Instant::now();
        let slices = slice_render_set(&captured.nodes, &self.area, self.options.overflow);
        if let Some(logger) = debug {
            logger.log_event(
                "pipeline.slice",
                json!({
                    "sources": captured.nodes.len(),
                    "slices": slices.len(),
                    "overflow": self.options.overflow.as_str(),
                }),
            );
            logger.increment("slice.count", slices.len() as u64);
        }

        let composition = compositor::compose_pages(
            &captured.nodes,
            &slices,
            self.page_size,
            &self.area,
            self.options.enable_links,
            debug,
        );
        let mut document = composition.document;
        if self.options.show_page_numbers {
            apply_page_numbers(
                &mut document,
                self.options.page_number_position,
                self.options.margins,
            );
        }

        let metrics = ConversionMetrics {
            pages: composition.pages,
            capture_count: captured.nodes.len(),
            capture_ms: captured.capture_ms,
            compose_ms: compose_started.elapsed().as_secs_f64() * 1000.0,
            total_bytes: 0,
            rows_cut: uncovered_rows(&captured.nodes, &slices),
        };
        log::debug!(
            "composed {} pages from {} captures",
            document.pages.len(),
            metrics.capture_count
        );
        Ok((document, metrics))
    }
}

impl PaperSliceBuilder {
    pub fn new() -> Self {
        Self {
            options: ConvertOptions::default(),
            download_dir: PathBuf::from("."),
            debug_path: None,
        }
    }

    pub fn options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    /// Directory the download channel writes into.
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<PaperSlice, PaperSliceError> {
        let page_size = self.options.page_size()?;
        let area = ContentArea::new(page_size, self.options.margins)?;
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        Ok(PaperSlice {
            options: self.options,
            page_size,
            area,
            download_dir: self.download_dir,
            debug,
        })
    }
}

impl Default for PaperSliceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeNode, FakeStage, NodeSpec, link, row_pixel};

    /// Landscape 400x250 page with no margins: a 400-wide root captured at
    /// 2x slices into 500px bands.
    fn short_page() -> OptionsBuilder {
        ConvertOptions::builder()
            .format((400.0f32, 250.0f32))
            .orientation("landscape")
            .show_page_numbers(false)
    }

    fn engine(options: ConvertOptions) -> PaperSlice {
        PaperSlice::builder()
            .options(options)
            .build()
            .expect("engine")
    }

    fn tall_root() -> FakeNode {
        NodeSpec::new("div", 0.0, 0.0, 400.0, 600.0)
            .child(link("https://top.example", 10.0, 100.0, 40.0, 10.0))
            .child(link("https://middle.example", 10.0, 300.0, 40.0, 10.0))
            .child(link("https://bottom.example", 10.0, 550.0, 40.0, 10.0))
            .build()
    }

    fn bands(metrics: &ConversionMetrics) -> Vec<(u32, u32)> {
        metrics
            .pages
            .iter()
            .filter_map(|page| page.band)
            .map(|band| (band.y, band.bottom()))
            .collect()
    }

    fn labels(document: &Document) -> Vec<String> {
        document
            .pages
            .iter()
            .flat_map(|page| page.commands.iter())
            .filter_map(|command| match command {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn paginate_splits_one_tall_render_into_bands() {
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(short_page().overflow("paginate").build());
        let (document, metrics) = engine
            .render_document(&stage, Some(Content::Markup("<div>...</div>")))
            .expect("render");

        assert_eq!(document.pages.len(), 3);
        assert_eq!(bands(&metrics), vec![(0, 500), (500, 1000), (1000, 1200)]);
        assert_eq!(metrics.capture_count, 1);
        assert_eq!(document.images[1].pixels.get_pixel(0, 0), &row_pixel(500));
        assert_eq!(document.images[2].pixels.height(), 200);
    }

    #[test]
    fn cut_draws_only_the_first_band() {
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(short_page().overflow("cut").build());
        let (document, metrics) = engine
            .render_document(&stage, Some(Content::Markup("<div>...</div>")))
            .expect("render");

        assert_eq!(document.pages.len(), 1);
        assert_eq!(bands(&metrics), vec![(0, 500)]);
        assert_eq!(document.images.len(), 1);
        let image = &document.images[0].pixels;
        assert_eq!(image.height(), 500);
        assert_eq!(image.get_pixel(0, 499), &row_pixel(499));
        assert_eq!(metrics.rows_cut, 700);
    }

    #[test]
    fn cut_overflow_is_reported_as_a_warning() {
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(short_page().overflow("cut").build());
        let conversion = engine
            .convert(&stage, Some(Content::Markup("<div/>")))
            .expect("convert");
        assert_eq!(conversion.metrics.rows_cut, 700);
        assert_eq!(conversion.warnings.len(), 1);
        assert!(conversion.warnings[0].contains("700"), "{:?}", conversion.warnings);
    }

    #[test]
    fn links_follow_their_band() {
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(short_page().overflow("paginate").build());
        let (document, metrics) = engine
            .render_document(&stage, Some(Content::Markup("<div/>")))
            .expect("render");

        let uris: Vec<Vec<&str>> = document
            .pages
            .iter()
            .map(|page| page.links.iter().map(|link| link.uri.as_str()).collect())
            .collect();
        assert_eq!(
            uris,
            vec![
                vec!["https://top.example"],
                vec!["https://middle.example"],
                vec!["https://bottom.example"],
            ]
        );
        // Layout y 550 -> px 1100 -> 100px into the last band -> 50pt.
        assert_eq!(document.pages[2].links[0].rect, Rect::from_f32(10.0, 50.0, 40.0, 10.0));
        assert_eq!(metrics.links_attached(), 3);
        assert_eq!(metrics.pages[0].links_clipped, 2);
    }

    #[test]
    fn disabled_links_are_not_attached() {
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(short_page().overflow("paginate").enable_links(false).build());
        let (document, _) = engine
            .render_document(&stage, Some(Content::Markup("<div/>")))
            .expect("render");
        assert!(document.pages.iter().all(|page| page.links.is_empty()));
    }

    #[test]
    fn class_mode_paginates_each_node_independently() {
        let sheet = |top: f64, height: f64| {
            NodeSpec::new("section", 0.0, top, 400.0, height)
                .class("pdf-page")
                .build()
        };
        let root = NodeSpec::new("main", 0.0, 0.0, 400.0, 600.0)
            .child(sheet(0.0, 100.0))
            .child(sheet(100.0, 300.0))
            .child(sheet(400.0, 200.0))
            .build();
        let stage = FakeStage::new();
        let options = short_page()
            .page_break_mode("class")
            .overflow("paginate")
            .show_page_numbers(true)
            .build();
        let (document, metrics) = engine(options)
            .render_document(&stage, Some(Content::Node(&root)))
            .expect("render");

        assert_eq!(metrics.capture_count, 3);
        assert_eq!(
            metrics
                .pages
                .iter()
                .map(|page| page.source_index)
                .collect::<Vec<_>>(),
            vec![0, 1, 1, 2]
        );
        assert_eq!(bands(&metrics), vec![(0, 200), (0, 500), (500, 600), (0, 400)]);
        assert_eq!(labels(&document), vec!["1 / 4", "2 / 4", "3 / 4", "4 / 4"]);
        assert_eq!(stage.events(), vec!["clone", "release:main"]);
    }

    #[test]
    fn zero_height_last_node_still_gets_a_numbered_page() {
        let root = NodeSpec::new("main", 0.0, 0.0, 400.0, 100.0)
            .child(
                NodeSpec::new("section", 0.0, 0.0, 400.0, 100.0)
                    .class("pdf-page")
                    .build(),
            )
            .child(
                NodeSpec::new("section", 0.0, 100.0, 400.0, 0.0)
                    .class("pdf-page")
                    .build(),
            )
            .build();
        let options = short_page()
            .page_break_mode("class")
            .overflow("paginate")
            .show_page_numbers(true)
            .build();
        let (document, metrics) = engine(options)
            .render_document(&FakeStage::new(), Some(Content::Node(&root)))
            .expect("render");

        assert_eq!(metrics.pages.len(), 2);
        assert_eq!(document.pages.len(), 2);
        assert_eq!(labels(&document), vec!["1 / 2", "2 / 2"]);
    }

    #[test]
    fn missing_or_blank_content_is_rejected() {
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(ConvertOptions::default());
        let err = match engine.render_document(&stage, None) {
            Ok(_) => panic!("missing content should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, PaperSliceError::NoContent));
        let err = match engine.convert(&stage, Some(Content::Markup("  \n"))) {
            Ok(_) => panic!("blank markup should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, PaperSliceError::NoContent));
        assert!(stage.events().is_empty());
    }

    #[test]
    fn staged_nodes_are_released_when_capture_fails() {
        let root = NodeSpec::new("div", 0.0, 0.0, 400.0, 600.0)
            .failing()
            .build();
        let stage = FakeStage::new().with_markup_tree(root);
        let err = match engine(short_page().build())
            .render_document(&stage, Some(Content::Markup("<div/>")))
        {
            Ok(_) => panic!("capture should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, PaperSliceError::Capture(_)));
        assert_eq!(stage.live_nodes(), 0);
        assert_eq!(
            stage.events(),
            vec!["mount", "clone", "release:div", "release:div"]
        );
    }

    #[test]
    fn mounted_markup_is_released_when_clone_fails() {
        let stage = FakeStage::new()
            .with_markup_tree(tall_root())
            .failing_clone();
        let result = engine(short_page().build())
            .render_document(&stage, Some(Content::Markup("<div/>")));
        assert!(result.is_err());
        assert_eq!(stage.live_nodes(), 0);
        assert_eq!(stage.events(), vec!["mount", "release:div"]);
    }

    #[test]
    fn degenerate_content_area_fails_at_build() {
        let options = ConvertOptions::builder()
            .format((100.0f32, 100.0f32))
            .margins(&[10.0, 60.0])
            .build();
        let err = match PaperSlice::builder().options(options).build() {
            Ok(_) => panic!("margins wider than the page should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, PaperSliceError::InvalidConfiguration(_)));
    }

    #[test]
    fn unknown_output_falls_back_to_preview_with_warning() {
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(short_page().overflow("paginate").output("fax").build());
        let conversion = engine
            .convert(&stage, Some(Content::Markup("<div/>")))
            .expect("convert");
        assert_eq!(conversion.warnings.len(), 1);
        assert!(conversion.warnings[0].contains("fax"));
        let Delivery::Preview(uri) = &conversion.delivery else {
            panic!("expected preview delivery");
        };
        assert!(uri.starts_with("data:application/pdf;base64,"));
        assert_eq!(conversion.metrics.total_bytes, conversion.pdf.len());
    }

    #[test]
    fn download_writes_an_inspectable_pdf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let options = short_page()
            .overflow("paginate")
            .show_page_numbers(true)
            .output("download")
            .filename("quarterly.html")
            .build();
        let engine = PaperSlice::builder()
            .options(options)
            .download_dir(dir.path())
            .build()
            .expect("engine");
        let conversion = engine
            .convert(&stage, Some(Content::Markup("<div/>")))
            .expect("convert");

        let Delivery::Saved(path) = &conversion.delivery else {
            panic!("expected saved delivery");
        };
        assert_eq!(path, &dir.path().join("quarterly.pdf"));
        let report = inspect_pdf_path(path).expect("inspect");
        assert_eq!(report.page_count, 3);
        assert_eq!(report.media_box, Some((400.0, 250.0)));
        assert_eq!(
            report.link_uris,
            vec![
                vec!["https://top.example".to_string()],
                vec!["https://middle.example".to_string()],
                vec!["https://bottom.example".to_string()],
            ]
        );
        assert!(conversion.warnings.is_empty());
    }

    #[test]
    fn trigger_payload_drives_a_conversion() {
        let payload = r#"{
            "element": "<section>report</section>",
            "options": {
                "format": [400, 250],
                "orientation": "landscape",
                "overflow": "paginate",
                "output": "print",
                "filename": "trigger",
                "pageNumberPosition": "top-right"
            }
        }"#;
        let trigger = Trigger::from_json(payload).expect("trigger");
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = engine(trigger.options.clone());
        let conversion = engine
            .convert(&stage, trigger.markup.as_deref().map(Content::Markup))
            .expect("convert");
        assert_eq!(conversion.document.pages.len(), 3);
        assert_eq!(labels(&conversion.document)[0], "1 / 3");
        let Delivery::Print(job) = &conversion.delivery else {
            panic!("expected print delivery");
        };
        assert_eq!(job.title, "trigger.pdf");
        assert_eq!(job.bytes, conversion.pdf);
    }

    #[test]
    fn debug_log_records_pipeline_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("debug.jsonl");
        let stage = FakeStage::new().with_markup_tree(tall_root());
        let engine = PaperSlice::builder()
            .options(short_page().overflow("paginate").build())
            .debug_log(&log_path)
            .build()
            .expect("engine");
        engine
            .render_document(&stage, Some(Content::Markup("<div/>")))
            .expect("render");

        let text = std::fs::read_to_string(&log_path).expect("read log");
        let events: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("json"))
            .collect();
        let kinds: Vec<&str> = events
            .iter()
            .filter_map(|event| event["type"].as_str())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "pipeline.select",
                "pipeline.capture",
                "pipeline.slice",
                "pipeline.page",
                "pipeline.page",
                "pipeline.page",
                "debug.summary",
            ]
        );
        let summary = &events[events.len() - 1];
        assert_eq!(summary["counts"]["capture.count"], 1);
        assert_eq!(summary["counts"]["slice.count"], 3);
        assert_eq!(summary["counts"]["link.attached"], 3);
    }
}
