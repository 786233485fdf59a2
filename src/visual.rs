//! Capability interfaces over the live visual tree and its capture service.
//! The pagination core only ever talks to these traits, so it can run against
//! a browser bridge or a synthetic in-memory tree alike.

use crate::error::PaperSliceError;
use crate::types::{LayoutRect, PxRect};
use image::{Rgba, RgbaImage};

/// Fixed-size pixel grid produced by capturing a visual node.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Copies a pixel band out of the surface. The band is clamped to the
    /// surface bounds.
    pub fn crop(&self, band: PxRect) -> RgbaImage {
        let x = band.x.min(self.width());
        let y = band.y.min(self.height());
        let width = band.width.min(self.width() - x);
        let height = band.height.min(self.height() - y);
        image::imageops::crop_imm(&self.pixels, x, y, width, height).to_image()
    }
}

/// A node of the visual tree. Handles are cheap to clone (they refer to the
/// same live node).
pub trait Visual: Clone {
    /// Layout rectangle in the tree's current layout space.
    fn bounding_rect(&self) -> LayoutRect;

    /// Every descendant, excluding `self`, in document order.
    fn descendants(&self) -> Vec<Self>;

    fn tag_name(&self) -> String;

    fn has_class(&self, class: &str) -> bool;

    fn attribute(&self, name: &str) -> Option<String>;

    /// Rasterizes the node at `scale` device pixels per layout unit.
    fn capture(&self, scale: f32) -> Result<RasterSurface, PaperSliceError>;

    fn descendants_matching<P>(&self, predicate: P) -> Vec<Self>
    where
        P: Fn(&Self) -> bool,
    {
        self.descendants()
            .into_iter()
            .filter(|node| predicate(node))
            .collect()
    }
}

/// Hosts temporary off-screen nodes used to stabilize measurements.
pub trait Stage {
    type Node: Visual;

    /// Mounts markup into a hidden off-screen container and returns it.
    fn mount_markup(&self, markup: &str) -> Result<Self::Node, PaperSliceError>;

    /// Deep-clones `node` off-screen with its width pinned to `width`.
    fn clone_offscreen(&self, node: &Self::Node, width: f64)
    -> Result<Self::Node, PaperSliceError>;

    /// Detaches a node previously returned by this stage.
    fn release(&self, node: &Self::Node);
}

/// Scoped off-screen node, released when dropped on any exit path.
pub struct StagedNode<'s, S: Stage> {
    stage: &'s S,
    node: S::Node,
}

impl<'s, S: Stage> StagedNode<'s, S> {
    pub fn new(stage: &'s S, node: S::Node) -> Self {
        Self { stage, node }
    }

    pub fn node(&self) -> &S::Node {
        &self.node
    }
}

impl<S: Stage> Drop for StagedNode<'_, S> {
    fn drop(&mut self) {
        self.stage.release(&self.node);
    }
}

/// Predicate used by the node selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeMatcher {
    Class(String),
    Tag(String),
}

impl NodeMatcher {
    /// Class selectors may be written with or without the leading dot.
    pub fn class(selector: &str) -> Self {
        NodeMatcher::Class(selector.trim().trim_start_matches('.').to_string())
    }

    pub fn tag(selector: &str) -> Self {
        NodeMatcher::Tag(selector.trim().to_ascii_lowercase())
    }

    pub fn matches<V: Visual>(&self, node: &V) -> bool {
        match self {
            NodeMatcher::Class(class) => !class.is_empty() && node.has_class(class),
            NodeMatcher::Tag(tag) => !tag.is_empty() && node.tag_name().eq_ignore_ascii_case(tag),
        }
    }
}

/// What the caller wants rendered.
#[derive(Debug)]
pub enum Content<'a, N> {
    Node(&'a N),
    Markup(&'a str),
}

impl<N> Clone for Content<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for Content<'_, N> {}
