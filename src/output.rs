use crate::error::PaperSliceError;
use crate::options::OutputChannel;
use base64::Engine;
use std::path::{Path, PathBuf};

const PREVIEW_PREFIX: &str = "data:application/pdf;base64,";

/// Document handed to the host print dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub title: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Written to disk at this path.
    Saved(PathBuf),
    /// Inline preview URI for an embedded viewer.
    Preview(String),
    Print(PrintJob),
}

/// Reduces a caller-supplied name to a bare `<stem>.pdf` file name. Any
/// directory part and existing extension are dropped.
pub fn normalize_filename(raw: &str) -> String {
    let base = raw
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let mut stem = base;
    while let Some(cut) = stem.len().checked_sub(4) {
        match stem.get(cut..) {
            Some(tail) if tail.eq_ignore_ascii_case(".pdf") => stem = &stem[..cut],
            _ => break,
        }
    }
    let stem = match stem.rfind('.') {
        Some(dot) if dot > 0 => &stem[..dot],
        _ => stem,
    };
    let stem = stem.trim_matches(|ch: char| ch == '.' || ch.is_whitespace());
    if stem.is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}

pub fn preview_uri(bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("{PREVIEW_PREFIX}{encoded}")
}

/// Hands finished bytes to the selected channel.
pub fn dispatch(
    channel: OutputChannel,
    bytes: &[u8],
    filename: &str,
    download_dir: &Path,
) -> Result<Delivery, PaperSliceError> {
    let filename = normalize_filename(filename);
    match channel {
        OutputChannel::Download => {
            std::fs::create_dir_all(download_dir)?;
            let path = download_dir.join(&filename);
            std::fs::write(&path, bytes)?;
            log::info!("saved {} ({} bytes)", path.display(), bytes.len());
            Ok(Delivery::Saved(path))
        }
        OutputChannel::Iframe => Ok(Delivery::Preview(preview_uri(bytes))),
        OutputChannel::Print => Ok(Delivery::Print(PrintJob {
            title: filename,
            bytes: bytes.to_vec(),
        })),
    }
}
