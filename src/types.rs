use fixed::types::I32F32;

/// Output page unit (PDF point) stored as fixed-point so repeated page
/// arithmetic stays deterministic.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Pt {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }

    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

/// Rectangle in output page space, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn from_f32(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    pub fn right(&self) -> Pt {
        self.x + self.width
    }

    pub fn bottom(&self) -> Pt {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl Margins {
    pub const ZERO: Margins = Margins {
        top: Pt::ZERO,
        right: Pt::ZERO,
        bottom: Pt::ZERO,
        left: Pt::ZERO,
    };

    pub fn all(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top: Pt::from_f32(top),
            right: Pt::from_f32(right),
            bottom: Pt::from_f32(bottom),
            left: Pt::from_f32(left),
        }
    }

    /// CSS-style shorthand: 1 value sets every side, 2 values are
    /// (vertical, horizontal), 3 values are (top, horizontal, bottom) and
    /// 4 values are (top, right, bottom, left). Any other arity is rejected.
    pub fn from_shorthand(values: &[f32]) -> Option<Self> {
        match *values {
            [all] => Some(Self::all(all)),
            [vertical, horizontal] => Some(Self::new(vertical, horizontal, vertical, horizontal)),
            [top, horizontal, bottom] => Some(Self::new(top, horizontal, bottom, horizontal)),
            [top, right, bottom, left] => Some(Self::new(top, right, bottom, left)),
            _ => None,
        }
    }

    pub fn has_negative_side(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .any(|side| *side < Pt::ZERO)
    }
}

impl Default for Margins {
    fn default() -> Self {
        Margins::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn gray8(level: u8) -> Self {
        let v = level as f32 / 255.0;
        Self { r: v, g: v, b: v }
    }
}

/// Rectangle in the layout space of the visual tree at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Expresses `self` relative to the top-left corner of `origin`.
    pub fn relative_to(&self, origin: &LayoutRect) -> LayoutRect {
        LayoutRect {
            left: self.left - origin.left,
            top: self.top - origin.top,
            width: self.width,
            height: self.height,
        }
    }
}

/// Horizontal-band or sub-region of a raster surface, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PxRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PxRect {
    pub fn band(y: u32, width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
