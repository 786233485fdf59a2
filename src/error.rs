use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaperSliceError {
    #[error("no content to render")]
    NoContent,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single link annotation could not be attached to a page. Never fatal
/// for the document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkAttachError {
    #[error("link target is empty")]
    EmptyTarget,
    #[error("link rectangle is degenerate ({width}x{height})")]
    DegenerateRect { width: f32, height: f32 },
    #[error("link rectangle is not finite")]
    NonFiniteRect,
}
