//! Length handling for the presentation's native geometric unit.
//!
//! OOXML measures geometry in English Metric Units: 914400 EMU per inch.
//! The rasterizer works in pixels at a fixed 96 dpi device density, the
//! page-size calculation works in millimeters, and the PDF writer works
//! in points (72 per inch). All three are derived from the inch value.

pub const EMU_PER_INCH: i64 = 914_400;
pub const PX_PER_INCH: f64 = 96.0;
pub const MM_PER_INCH: f64 = 25.4;
pub const PT_PER_INCH: f64 = 72.0;

/// A length in English Metric Units. Negative magnitudes are carried
/// uninterpreted; the renderer decides what to do with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Emu(i64);

impl Emu {
    pub const ZERO: Emu = Emu(0);

    pub fn new(raw: i64) -> Emu {
        Emu(raw)
    }

    pub fn from_inches(inches: f64) -> Emu {
        Emu((inches * EMU_PER_INCH as f64).round() as i64)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn to_inches(self) -> f64 {
        self.0 as f64 / EMU_PER_INCH as f64
    }

    pub fn to_px(self) -> f32 {
        (self.to_inches() * PX_PER_INCH) as f32
    }

    /// Pixel magnitude floored to a whole device pixel. Canvas dimensions
    /// use this; fractional positions stay in [`Emu::to_px`].
    pub fn to_px_floor(self) -> i64 {
        (self.to_inches() * PX_PER_INCH).floor() as i64
    }

    pub fn to_mm(self) -> f64 {
        self.to_inches() * MM_PER_INCH
    }

    pub fn to_pt(self) -> f64 {
        self.to_inches() * PT_PER_INCH
    }
}

/// Millimeter page size, uniform across the whole output document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSizeMm {
    pub width: f64,
    pub height: f64,
}

impl PageSizeMm {
    pub fn from_emu(width: Emu, height: Emu) -> PageSizeMm {
        PageSizeMm {
            width: width.to_mm(),
            height: height.to_mm(),
        }
    }
}
