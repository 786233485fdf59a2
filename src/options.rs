use crate::error::PaperSliceError;
use crate::types::{Margins, Pt, Size};
use serde::Deserialize;

/// Closed option enumerations. `parse` is strict, `From<&str>` is lenient and
/// maps anything unrecognized to the default so callers can probe the
/// effective value.
macro_rules! option_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn parse(raw: &str) -> Option<Self> {
                match raw.trim().to_ascii_lowercase().as_str() {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                $name::parse(raw).unwrap_or_else(|| {
                    let fallback = $name::default();
                    log::warn!(
                        "unknown {} '{}', using '{}'",
                        stringify!($name),
                        raw,
                        fallback.as_str()
                    );
                    fallback
                })
            }
        }
    };
}

option_enum! {
    /// How the root node is split into independently captured renders.
    PageBreakMode, default = None {
        None => "none",
        Class => "class",
        Tag => "tag",
    }
}

option_enum! {
    Orientation, default = Portrait {
        Portrait => "portrait",
        Landscape => "landscape",
    }
}

option_enum! {
    /// What happens to a render taller than one page.
    Overflow, default = Cut {
        Cut => "cut",
        Paginate => "paginate",
    }
}

option_enum! {
    PageNumberPosition, default = BottomCenter {
        BottomCenter => "bottom-center",
        BottomRight => "bottom-right",
        TopCenter => "top-center",
        TopRight => "top-right",
    }
}

option_enum! {
    OutputChannel, default = Iframe {
        Iframe => "iframe",
        Download => "download",
        Print => "print",
    }
}

option_enum! {
    /// Named paper sizes, dimensions in PDF points (portrait).
    PaperSize, default = A4 {
        A0 => "a0",
        A1 => "a1",
        A2 => "a2",
        A3 => "a3",
        A4 => "a4",
        A5 => "a5",
        A6 => "a6",
        B4 => "b4",
        B5 => "b5",
        Letter => "letter",
        Legal => "legal",
        Tabloid => "tabloid",
        Ledger => "ledger",
        Executive => "executive",
    }
}

impl PaperSize {
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PaperSize::A0 => (2383.94, 3370.39),
            PaperSize::A1 => (1683.78, 2383.94),
            PaperSize::A2 => (1190.55, 1683.78),
            PaperSize::A3 => (841.89, 1190.55),
            PaperSize::A4 => (595.28, 841.89),
            PaperSize::A5 => (419.53, 595.28),
            PaperSize::A6 => (297.64, 419.53),
            PaperSize::B4 => (708.66, 1000.63),
            PaperSize::B5 => (498.9, 708.66),
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::Legal => (612.0, 1008.0),
            PaperSize::Tabloid => (792.0, 1224.0),
            PaperSize::Ledger => (1224.0, 792.0),
            PaperSize::Executive => (521.86, 756.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageFormat {
    Named(PaperSize),
    /// Explicit width/height in points.
    Explicit { width: f32, height: f32 },
}

impl PageFormat {
    /// Resolves to a page size. Orientation normalizes the aspect: portrait
    /// pages are taller than wide, landscape pages wider than tall.
    pub fn resolve(&self, orientation: Orientation) -> Result<Size, PaperSliceError> {
        let (width, height) = match *self {
            PageFormat::Named(paper) => paper.dimensions(),
            PageFormat::Explicit { width, height } => (width, height),
        };
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(PaperSliceError::InvalidConfiguration(format!(
                "page size must be positive, got {}x{}",
                width, height
            )));
        }
        let size = Size::new(width, height);
        let flip = match orientation {
            Orientation::Portrait => width > height,
            Orientation::Landscape => height > width,
        };
        Ok(if flip { size.swapped() } else { size })
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        PageFormat::Named(PaperSize::A4)
    }
}

impl From<&str> for PageFormat {
    fn from(raw: &str) -> Self {
        match PaperSize::parse(raw) {
            Some(paper) => PageFormat::Named(paper),
            None => {
                log::warn!("unknown page format '{}', using a4", raw);
                PageFormat::Named(PaperSize::A4)
            }
        }
    }
}

impl From<(f32, f32)> for PageFormat {
    fn from((width, height): (f32, f32)) -> Self {
        PageFormat::Explicit { width, height }
    }
}

/// Per-side margin overrides; `None` keeps the current value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MarginSides {
    pub top: Option<f32>,
    pub right: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
}

impl MarginSides {
    fn merge_into(&self, base: Margins) -> Margins {
        let pick = |side: Option<f32>, current: Pt| side.map(Pt::from_f32).unwrap_or(current);
        Margins {
            top: pick(self.top, base.top),
            right: pick(self.right, base.right),
            bottom: pick(self.bottom, base.bottom),
            left: pick(self.left, base.left),
        }
    }
}

pub const DEFAULT_FILENAME: &str = "document.pdf";
pub const DEFAULT_CAPTURE_SCALE: f32 = 2.0;
pub const DEFAULT_CLASS_SELECTOR: &str = ".pdf-page";
pub const DEFAULT_TAG_SELECTOR: &str = "section";

/// Immutable conversion settings. Build with [`ConvertOptions::builder`] or
/// [`ConvertOptions::from_json`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub page_break_mode: PageBreakMode,
    pub selector: String,
    pub enable_links: bool,
    pub format: PageFormat,
    pub orientation: Orientation,
    pub margins: Margins,
    pub overflow: Overflow,
    pub show_page_numbers: bool,
    pub page_number_position: PageNumberPosition,
    pub output: OutputChannel,
    /// Raw output value that did not name a known channel.
    pub unknown_output: Option<String>,
    pub filename: String,
    pub capture_scale: f32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            page_break_mode: PageBreakMode::None,
            selector: String::new(),
            enable_links: true,
            format: PageFormat::default(),
            orientation: Orientation::Portrait,
            margins: Margins::ZERO,
            overflow: Overflow::Cut,
            show_page_numbers: true,
            page_number_position: PageNumberPosition::BottomCenter,
            output: OutputChannel::Iframe,
            unknown_output: None,
            filename: DEFAULT_FILENAME.to_string(),
            capture_scale: DEFAULT_CAPTURE_SCALE,
        }
    }
}

impl ConvertOptions {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    pub fn page_size(&self) -> Result<Size, PaperSliceError> {
        self.format.resolve(self.orientation)
    }

    /// Selector actually used for the current page-break mode.
    pub fn effective_selector(&self) -> &str {
        let trimmed = self.selector.trim();
        match self.page_break_mode {
            PageBreakMode::None => "",
            PageBreakMode::Class if trimmed.is_empty() => DEFAULT_CLASS_SELECTOR,
            PageBreakMode::Tag if trimmed.is_empty() => DEFAULT_TAG_SELECTOR,
            _ => trimmed,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, PaperSliceError> {
        let raw: RawOptions = serde_json::from_str(json).map_err(|err| {
            PaperSliceError::InvalidConfiguration(format!("options payload: {err}"))
        })?;
        Ok(raw.into_options())
    }
}

#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    options: ConvertOptions,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: ConvertOptions::default(),
        }
    }

    pub fn page_break_mode(mut self, mode: impl Into<PageBreakMode>) -> Self {
        self.options.page_break_mode = mode.into();
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.options.selector = selector.into();
        self
    }

    pub fn enable_links(mut self, enabled: bool) -> Self {
        self.options.enable_links = enabled;
        self
    }

    pub fn format(mut self, format: impl Into<PageFormat>) -> Self {
        self.options.format = format.into();
        self
    }

    pub fn orientation(mut self, orientation: impl Into<Orientation>) -> Self {
        self.options.orientation = orientation.into();
        self
    }

    /// CSS shorthand with 1 to 4 values; any other count leaves margins as they are.
    pub fn margins(mut self, values: &[f32]) -> Self {
        if let Some(margins) = Margins::from_shorthand(values) {
            self.options.margins = margins;
        }
        self
    }

    pub fn margin_sides(mut self, sides: MarginSides) -> Self {
        self.options.margins = sides.merge_into(self.options.margins);
        self
    }

    pub fn overflow(mut self, overflow: impl Into<Overflow>) -> Self {
        self.options.overflow = overflow.into();
        self
    }

    pub fn show_page_numbers(mut self, show: bool) -> Self {
        self.options.show_page_numbers = show;
        self
    }

    pub fn page_number_position(mut self, position: impl Into<PageNumberPosition>) -> Self {
        self.options.page_number_position = position.into();
        self
    }

    pub fn output_channel(mut self, channel: OutputChannel) -> Self {
        self.options.output = channel;
        self.options.unknown_output = None;
        self
    }

    /// Unknown channel names fall back to the iframe preview; the raw value is
    /// kept so the conversion can report it.
    pub fn output(mut self, raw: &str) -> Self {
        match OutputChannel::parse(raw) {
            Some(channel) => {
                self.options.output = channel;
                self.options.unknown_output = None;
            }
            None => {
                self.options.output = OutputChannel::Iframe;
                self.options.unknown_output = Some(raw.to_string());
            }
        }
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.options.filename = filename.into();
        self
    }

    pub fn capture_scale(mut self, scale: f32) -> Self {
        self.options.capture_scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            DEFAULT_CAPTURE_SCALE
        };
        self
    }

    pub fn build(self) -> ConvertOptions {
        self.options
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFormat {
    Name(String),
    Dims([f32; 2]),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMargins {
    All(f32),
    Shorthand(Vec<f32>),
    Sides(MarginSides),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawOptions {
    page_break_mode: Option<String>,
    selector: Option<String>,
    enable_links: Option<bool>,
    output: Option<String>,
    filename: Option<String>,
    format: Option<RawFormat>,
    orientation: Option<String>,
    margins: Option<RawMargins>,
    overflow: Option<String>,
    show_page_numbers: Option<bool>,
    page_number_position: Option<String>,
    capture_scale: Option<f32>,
}

impl RawOptions {
    fn into_options(self) -> ConvertOptions {
        let mut builder = OptionsBuilder::new();
        if let Some(mode) = self.page_break_mode.as_deref() {
            builder = builder.page_break_mode(mode);
        }
        if let Some(selector) = self.selector {
            builder = builder.selector(selector);
        }
        if let Some(enabled) = self.enable_links {
            builder = builder.enable_links(enabled);
        }
        if let Some(output) = self.output.as_deref() {
            builder = builder.output(output);
        }
        if let Some(filename) = self.filename {
            builder = builder.filename(filename);
        }
        builder = match self.format {
            Some(RawFormat::Name(name)) => builder.format(name.as_str()),
            Some(RawFormat::Dims([width, height])) => builder.format((width, height)),
            None => builder,
        };
        if let Some(orientation) = self.orientation.as_deref() {
            builder = builder.orientation(orientation);
        }
        builder = match self.margins {
            Some(RawMargins::All(value)) => builder.margins(&[value]),
            Some(RawMargins::Shorthand(values)) => builder.margins(&values),
            Some(RawMargins::Sides(sides)) => builder.margin_sides(sides),
            None => builder,
        };
        if let Some(overflow) = self.overflow.as_deref() {
            builder = builder.overflow(overflow);
        }
        if let Some(show) = self.show_page_numbers {
            builder = builder.show_page_numbers(show);
        }
        if let Some(position) = self.page_number_position.as_deref() {
            builder = builder.page_number_position(position);
        }
        if let Some(scale) = self.capture_scale {
            builder = builder.capture_scale(scale);
        }
        builder.build()
    }
}

/// Framework trigger: content markup plus the full option set.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub markup: Option<String>,
    pub options: ConvertOptions,
}

#[derive(Debug, Deserialize)]
struct RawTrigger {
    element: Option<String>,
    #[serde(default)]
    options: Option<RawOptions>,
}

impl Trigger {
    pub fn from_json(json: &str) -> Result<Self, PaperSliceError> {
        let raw: RawTrigger = serde_json::from_str(json).map_err(|err| {
            PaperSliceError::InvalidConfiguration(format!("trigger payload: {err}"))
        })?;
        Ok(Self {
            markup: raw.element,
            options: raw.options.map(RawOptions::into_options).unwrap_or_default(),
        })
    }
}
