//! Synthetic in-memory visual tree used by the unit tests.

use crate::error::PaperSliceError;
use crate::types::LayoutRect;
use crate::visual::{RasterSurface, Stage, Visual};
use image::{Rgba, RgbaImage};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug)]
struct FakeNodeData {
    tag: String,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    rect: LayoutRect,
    children: Vec<FakeNode>,
    fail_capture: bool,
    captures: Cell<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeNode(Rc<FakeNodeData>);

impl FakeNode {
    pub(crate) fn capture_count(&self) -> usize {
        self.0.captures.get()
    }

    fn walk(&self, out: &mut Vec<FakeNode>) {
        for child in &self.0.children {
            out.push(child.clone());
            child.walk(out);
        }
    }
}

pub(crate) struct NodeSpec {
    tag: String,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    rect: LayoutRect,
    children: Vec<FakeNode>,
    fail_capture: bool,
}

impl NodeSpec {
    pub(crate) fn new(tag: &str, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            tag: tag.to_string(),
            classes: Vec::new(),
            attrs: Vec::new(),
            rect: LayoutRect::new(left, top, width, height),
            children: Vec::new(),
            fail_capture: false,
        }
    }

    pub(crate) fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub(crate) fn child(mut self, child: FakeNode) -> Self {
        self.children.push(child);
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    pub(crate) fn build(self) -> FakeNode {
        FakeNode(Rc::new(FakeNodeData {
            tag: self.tag,
            classes: self.classes,
            attrs: self.attrs,
            rect: self.rect,
            children: self.children,
            fail_capture: self.fail_capture,
            captures: Cell::new(0),
        }))
    }
}

pub(crate) fn link(href: &str, left: f64, top: f64, width: f64, height: f64) -> FakeNode {
    NodeSpec::new("a", left, top, width, height)
        .attr("href", href)
        .build()
}

/// Pixel encoding the row index, so tests can tell which band landed where.
pub(crate) fn row_pixel(y: u32) -> Rgba<u8> {
    Rgba([(y % 256) as u8, (y / 256 % 256) as u8, 0, 255])
}

impl Visual for FakeNode {
    fn bounding_rect(&self) -> LayoutRect {
        self.0.rect
    }

    fn descendants(&self) -> Vec<Self> {
        let mut out = Vec::new();
        self.walk(&mut out);
        out
    }

    fn tag_name(&self) -> String {
        self.0.tag.clone()
    }

    fn has_class(&self, class: &str) -> bool {
        self.0.classes.iter().any(|c| c == class)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn capture(&self, scale: f32) -> Result<RasterSurface, PaperSliceError> {
        self.0.captures.set(self.0.captures.get() + 1);
        if self.0.fail_capture {
            return Err(PaperSliceError::Capture(format!(
                "synthetic failure on <{}>",
                self.0.tag
            )));
        }
        let width = (self.0.rect.width * scale as f64).round().max(0.0) as u32;
        let height = (self.0.rect.height * scale as f64).round().max(0.0) as u32;
        let pixels = RgbaImage::from_fn(width, height, |_, y| row_pixel(y));
        Ok(RasterSurface::new(pixels))
    }
}

/// Stage that hands out the prepared tree for markup and counts live nodes.
pub(crate) struct FakeStage {
    markup_tree: Option<FakeNode>,
    fail_clone: bool,
    mounted: Cell<usize>,
    released: Cell<usize>,
    events: RefCell<Vec<String>>,
}

impl FakeStage {
    pub(crate) fn new() -> Self {
        Self {
            markup_tree: None,
            fail_clone: false,
            mounted: Cell::new(0),
            released: Cell::new(0),
            events: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_markup_tree(mut self, tree: FakeNode) -> Self {
        self.markup_tree = Some(tree);
        self
    }

    pub(crate) fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub(crate) fn live_nodes(&self) -> usize {
        self.mounted.get() - self.released.get()
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl Stage for FakeStage {
    type Node = FakeNode;

    fn mount_markup(&self, _markup: &str) -> Result<FakeNode, PaperSliceError> {
        let tree = self
            .markup_tree
            .clone()
            .ok_or_else(|| PaperSliceError::Capture("no markup tree prepared".to_string()))?;
        self.mounted.set(self.mounted.get() + 1);
        self.events.borrow_mut().push("mount".to_string());
        Ok(tree)
    }

    fn clone_offscreen(&self, node: &FakeNode, _width: f64) -> Result<FakeNode, PaperSliceError> {
        if self.fail_clone {
            return Err(PaperSliceError::Capture("clone refused".to_string()));
        }
        self.mounted.set(self.mounted.get() + 1);
        self.events.borrow_mut().push("clone".to_string());
        Ok(node.clone())
    }

    fn release(&self, node: &FakeNode) {
        self.released.set(self.released.get() + 1);
        self.events
            .borrow_mut()
            .push(format!("release:{}", node.tag_name()));
    }
}
