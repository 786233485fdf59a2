use crate::error::LinkAttachError;
use crate::types::{Color, Pt, Rect, Size};
use image::RgbaImage;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFillColor(Color),
    SetFontSize(Pt),
    /// `y` is the text baseline, measured from the top of the page.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

/// Clickable rectangle pointing at an external URI.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkAnnotation {
    pub rect: Rect,
    pub uri: String,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
    pub links: Vec<LinkAnnotation>,
}

impl Page {
    fn new() -> Self {
        Self::default()
    }
}

/// Raster placed on pages by id.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub id: String,
    pub pixels: RgbaImage,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub images: Vec<ImageResource>,
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    images: Vec<ImageResource>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            images: Vec::new(),
        }
    }

    /// Registers pixels as a document resource and returns its id.
    pub fn add_image(&mut self, pixels: RgbaImage) -> String {
        let id = format!("img{}", self.images.len() + 1);
        self.images.push(ImageResource {
            id: id.clone(),
            pixels,
        });
        id
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.current.commands.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    pub fn add_link(&mut self, rect: Rect, uri: &str) -> Result<(), LinkAttachError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(LinkAttachError::EmptyTarget);
        }
        if rect.width <= Pt::ZERO || rect.height <= Pt::ZERO {
            return Err(LinkAttachError::DegenerateRect {
                width: rect.width.to_f32(),
                height: rect.height.to_f32(),
            });
        }
        self.current.links.push(LinkAnnotation {
            rect,
            uri: uri.to_string(),
        });
        Ok(())
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.commands.is_empty() && self.current.links.is_empty()
    }

    pub fn finish(mut self) -> Document {
        if !self.is_current_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
            images: self.images,
        }
    }
}
