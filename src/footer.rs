use crate::canvas::{Command, Document};
use crate::options::PageNumberPosition;
use crate::types::{Color, Margins, Pt, Size};

pub const LABEL_FONT_SIZE: f32 = 10.0;
pub const LABEL_GRAY: u8 = 80;
/// Smallest distance kept between a bottom label baseline and the page edge.
const MIN_BOTTOM_INSET: f32 = 6.0;

/// `"{n} / {total}"`, 1-indexed.
pub fn page_label(page_index: usize, page_count: usize) -> String {
    format!("{} / {}", page_index + 1, page_count)
}

/// Advance width of `text` in Helvetica at `font_size`.
pub fn label_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|ch| match ch {
            '0'..='9' => 556,
            ' ' | '/' => 278,
            _ => 600,
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// Baseline origin for a label of `text_width`, top-left page coordinates.
pub fn label_origin(
    position: PageNumberPosition,
    page: Size,
    margins: Margins,
    text_width: f32,
    font_size: f32,
) -> (f32, f32) {
    let page_width = page.width.to_f32();
    let page_height = page.height.to_f32();
    let left = margins.left.to_f32();
    let centered = (page_width - text_width) / 2.0;
    let right_aligned = page_width - margins.right.to_f32() - text_width;
    let bottom = page_height - (margins.bottom.to_f32() / 2.0).max(MIN_BOTTOM_INSET);
    let top = margins.top.to_f32() + font_size;

    let (x, y) = match position {
        PageNumberPosition::BottomCenter => (centered, bottom),
        PageNumberPosition::BottomRight => (right_aligned, bottom),
        PageNumberPosition::TopCenter => (centered, top),
        PageNumberPosition::TopRight => (right_aligned, top),
    };
    (x.max(left), y)
}

/// Writes a page-number label on every page of `doc`.
pub fn apply_page_numbers(doc: &mut Document, position: PageNumberPosition, margins: Margins) {
    let total = doc.pages.len();
    let page_size = doc.page_size;
    for (index, page) in doc.pages.iter_mut().enumerate() {
        let text = page_label(index, total);
        let width = label_width(&text, LABEL_FONT_SIZE);
        let (x, y) = label_origin(position, page_size, margins, width, LABEL_FONT_SIZE);
        page.commands.push(Command::SetFillColor(Color::gray8(LABEL_GRAY)));
        page.commands.push(Command::SetFontSize(Pt::from_f32(LABEL_FONT_SIZE)));
        page.commands.push(Command::DrawString {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
            text,
        });
    }
}
