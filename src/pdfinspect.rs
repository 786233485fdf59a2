use lopdf::{Dictionary, Document as LoDocument, Object};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfEmptyOrNoPages,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfEmptyOrNoPages => "PDF_EMPTY_OR_NO_PAGES",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for PdfInspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PdfInspectError {}

/// Structural summary of a produced PDF, read back with an independent parser.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub file_size_bytes: usize,
    /// Width and height of the first page's media box.
    pub media_box: Option<(f32, f32)>,
    /// URI targets of link annotations, one entry per page in page order.
    pub link_uris: Vec<Vec<String>>,
    /// Image XObjects in the file, soft masks included.
    pub image_count: usize,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;

    let pages = pdf.get_pages();
    if pages.is_empty() {
        return Err(PdfInspectError {
            code: PdfInspectErrorCode::PdfEmptyOrNoPages,
            message: "pdf has no pages".to_string(),
        });
    }

    let mut media_box = None;
    let mut link_uris = Vec::with_capacity(pages.len());
    for page_id in pages.values() {
        let Ok(page) = pdf.get_dictionary(*page_id) else {
            link_uris.push(Vec::new());
            continue;
        };
        if media_box.is_none() {
            media_box = read_media_box(page);
        }
        link_uris.push(page_link_uris(&pdf, page));
    }

    let image_count = pdf
        .objects
        .values()
        .filter(|object| match object {
            Object::Stream(stream) => is_name(stream.dict.get(b"Subtype").ok(), b"Image"),
            _ => false,
        })
        .count();

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        file_size_bytes: bytes.len(),
        media_box,
        link_uris,
        image_count,
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfIoError,
        message: err.to_string(),
    })?;
    inspect_pdf_bytes(&data)
}

fn read_media_box(page: &Dictionary) -> Option<(f32, f32)> {
    let values = page.get(b"MediaBox").ok()?.as_array().ok()?;
    match values.as_slice() {
        [x0, y0, x1, y1] => Some((
            number(x1)? - number(x0)?,
            number(y1)? - number(y0)?,
        )),
        _ => None,
    }
}

fn page_link_uris(pdf: &LoDocument, page: &Dictionary) -> Vec<String> {
    let Some(annots) = page
        .get(b"Annots")
        .ok()
        .and_then(|object| pdf.dereference(object).ok())
        .and_then(|(_, object)| object.as_array().ok())
    else {
        return Vec::new();
    };
    annots
        .iter()
        .filter_map(|annot| {
            let (_, annot) = pdf.dereference(annot).ok()?;
            let annot = annot.as_dict().ok()?;
            if !is_name(annot.get(b"Subtype").ok(), b"Link") {
                return None;
            }
            let (_, action) = pdf.dereference(annot.get(b"A").ok()?).ok()?;
            let uri = action.as_dict().ok()?.get(b"URI").ok()?.as_str().ok()?;
            Some(String::from_utf8_lossy(uri).into_owned())
        })
        .collect()
}

fn is_name(object: Option<&Object>, expected: &[u8]) -> bool {
    matches!(object, Some(Object::Name(name)) if name.as_slice() == expected)
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}
