use crate::canvas::{Command, Document, ImageResource, LinkAnnotation, Page};
use crate::types::{Color, Pt};
use fixed::types::I32F32;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::io::{self, Write};

const FONT_RESOURCE: &str = "F1";
const DEFAULT_FONT_SIZE: f32 = 12.0;

struct EncodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Object ids reserved for one page.
struct PageIds {
    page: usize,
    content: usize,
    annots: Vec<usize>,
}

/// Serializes `doc` as a PDF 1.7 file. Image payloads are compressed in
/// parallel; everything else is written in page order.
pub fn document_to_pdf(doc: &Document, title: Option<&str>) -> io::Result<Vec<u8>> {
    let encoded: Vec<EncodedImage> = doc
        .images
        .par_iter()
        .map(encode_image)
        .collect::<io::Result<_>>()?;

    let catalog_id = 1;
    let pages_id = 2;
    let font_id = 3;
    let mut next_id = 4;

    let mut image_ids: Vec<(usize, Option<usize>)> = Vec::with_capacity(encoded.len());
    for image in &encoded {
        let id = next_id;
        next_id += 1;
        let smask = image.alpha.as_ref().map(|_| {
            let smask_id = next_id;
            next_id += 1;
            smask_id
        });
        image_ids.push((id, smask));
    }

    let mut page_ids: Vec<PageIds> = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        let page_id = next_id;
        let content = next_id + 1;
        next_id += 2;
        let annots = (0..page.links.len())
            .map(|offset| next_id + offset)
            .collect::<Vec<_>>();
        next_id += page.links.len();
        page_ids.push(PageIds {
            page: page_id,
            content,
            annots,
        });
    }
    let info_id = next_id;

    let mut objects: Vec<String> = Vec::with_capacity(info_id);
    objects.push(format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id));
    let kids = page_ids
        .iter()
        .map(|ids| format!("{} 0 R", ids.page))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids,
        page_ids.len()
    ));
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );

    for (image, (_, smask_id)) in encoded.iter().zip(&image_ids) {
        objects.push(image_object(image, *smask_id));
        if let Some(alpha) = &image.alpha {
            objects.push(smask_object(image.width, image.height, alpha));
        }
    }

    let page_height = doc.page_size.height;
    for (page, ids) in doc.pages.iter().zip(&page_ids) {
        let xobjects = page_xobjects(page, &doc.images, &image_ids);
        let annots = if ids.annots.is_empty() {
            String::new()
        } else {
            let refs = ids
                .annots
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" ");
            format!(" /Annots [{}]", refs)
        };
        objects.push(format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /{} {} 0 R >>{} >> /Contents {} 0 R{} >>",
            pages_id,
            fmt_pt(doc.page_size.width),
            fmt_pt(page_height),
            FONT_RESOURCE,
            font_id,
            xobjects,
            ids.content,
            annots
        ));
        let content = page_content(page, &doc.images, page_height);
        objects.push(stream_object(&content));
        for link in &page.links {
            objects.push(link_object(link, page_height));
        }
    }

    objects.push(info_object(title));
    debug_assert_eq!(objects.len(), info_id);

    Ok(build_pdf(objects, catalog_id, Some(info_id)))
}

fn page_xobjects(
    page: &Page,
    images: &[ImageResource],
    image_ids: &[(usize, Option<usize>)],
) -> String {
    let mut used: BTreeMap<usize, usize> = BTreeMap::new();
    for command in &page.commands {
        if let Command::DrawImage { resource_id, .. } = command {
            if let Some(index) = image_index(images, resource_id) {
                used.insert(index, image_ids[index].0);
            }
        }
    }
    if used.is_empty() {
        return String::new();
    }
    let entries = used
        .iter()
        .map(|(index, id)| format!("/{} {} 0 R", image_name(*index), id))
        .collect::<Vec<_>>()
        .join(" ");
    format!(" /XObject << {} >>", entries)
}

fn image_index(images: &[ImageResource], resource_id: &str) -> Option<usize> {
    images.iter().position(|image| image.id == resource_id)
}

fn image_name(index: usize) -> String {
    format!("Im{}", index + 1)
}

fn page_content(page: &Page, images: &[ImageResource], page_height: Pt) -> String {
    let mut out = String::new();
    let mut font_size = Pt::from_f32(DEFAULT_FONT_SIZE);
    for command in &page.commands {
        match command {
            Command::SetFillColor(color) => out.push_str(&fill_color(*color)),
            Command::SetFontSize(size) => font_size = *size,
            Command::DrawString { x, y, text } => {
                out.push_str(&format!(
                    "BT\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\n",
                    FONT_RESOURCE,
                    fmt_pt(font_size),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y),
                    escape_pdf_string(&win_ansi_text(text))
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(index) = image_index(images, resource_id) else {
                    log::warn!("page references unknown image '{}'", resource_id);
                    continue;
                };
                out.push_str(&format!(
                    "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    image_name(index)
                ));
            }
        }
    }
    out
}

fn fill_color(color: Color) -> String {
    format!(
        "{} {} {} rg\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn link_object(link: &LinkAnnotation, page_height: Pt) -> String {
    let rect = link.rect;
    format!(
        "<< /Type /Annot /Subtype /Link /Rect [{} {} {} {}] /Border [0 0 0] /A << /S /URI /URI ({}) >> >>",
        fmt_pt(rect.x),
        fmt_pt(page_height - rect.bottom()),
        fmt_pt(rect.right()),
        fmt_pt(page_height - rect.y),
        escape_pdf_string(&link.uri)
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec!["/Producer (paperslice)".to_string()];
    if let Some(title) = title {
        entries.push(format!(
            "/Title ({})",
            escape_pdf_string(&win_ansi_text(title))
        ));
    }
    format!("<< {} >>", entries.join(" "))
}

/// Widened before multiplying; wide captures overflow `u32`.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn encode_image(image: &ImageResource) -> io::Result<EncodedImage> {
    let (width, height) = image.pixels.dimensions();
    let pixel_count = pixel_count(width, height);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_alpha = false;
    for pixel in image.pixels.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Ok(EncodedImage {
        width,
        height,
        rgb: flate_compress(&rgb)?,
        alpha: if has_alpha {
            Some(flate_compress(&alpha)?)
        } else {
            None
        },
    })
}

fn image_object(image: &EncodedImage, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.rgb);
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode]{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        stream_data.len(),
        smask,
        stream_data
    )
}

fn smask_object(width: u32, height: u32, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        width,
        height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn flate_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn build_pdf(objects: Vec<String>, catalog_id: usize, info_id: Option<usize>) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    let mut trailer = format!(
        "trailer\n<< /Size {} /Root {} 0 R",
        objects.len() + 1,
        catalog_id
    );
    if let Some(info_id) = info_id {
        trailer.push_str(&format!(" /Info {} 0 R", info_id));
    }
    trailer.push_str(&format!(" >>\nstartxref\n{}\n%%EOF", xref_start));
    out.extend_from_slice(trailer.as_bytes());
    out
}

/// Keeps printable ASCII; anything the base-14 encoding cannot show becomes `?`.
fn win_ansi_text(input: &str) -> String {
    input
        .chars()
        .map(|ch| if (' '..='~').contains(&ch) { ch } else { '?' })
        .collect()
}

fn escape_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
