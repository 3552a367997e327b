//! # Printer Configuration
//!
//! Hardware specifications for the supported thermal label printer and the
//! label geometry derived from them.
//!
//! ## Supported Printers
//!
//! | Model | Resolution | Media width | Gap |
//! |-------|------------|-------------|-----|
//! | Xprinter XP-365B | 203 DPI | 20–82mm | 2mm |
//!
//! ## Usage
//!
//! ```
//! use seatlabel::printer::{LabelSpec, PrinterConfig};
//!
//! let config = PrinterConfig::XP365B;
//! let spec = LabelSpec::new(60.0, 40.0, config.dpi)?;
//! assert_eq!((spec.width_px(), spec.height_px()), (480, 320));
//! # Ok::<(), seatlabel::LabelError>(())
//! ```

use crate::error::LabelError;

/// Millimeters per inch.
pub const MM_PER_INCH: f32 = 25.4;

/// Longest label side accepted, in millimeters.
pub const MAX_LABEL_MM: f32 = 300.0;

/// Convert millimeters to whole pixels at the given DPI.
///
/// Truncates toward zero: `floor(mm / 25.4 * dpi)`. Callers pass `mm >= 0`.
///
/// ```
/// use seatlabel::printer::mm_to_pixels;
///
/// assert_eq!(mm_to_pixels(25.4, 203), 203);
/// assert_eq!(mm_to_pixels(60.0, 203), 479);
/// ```
#[inline]
pub fn mm_to_pixels(mm: f32, dpi: u16) -> u32 {
    (mm / MM_PER_INCH * dpi as f32) as u32
}

/// Signed variant of [`mm_to_pixels`] for user offsets, which may be negative.
#[inline]
pub fn mm_to_offset(mm: f32, dpi: u16) -> i32 {
    (mm / MM_PER_INCH * dpi as f32) as i32
}

/// # Printer Configuration
///
/// Defines the hardware characteristics of a thermal label printer.
///
/// ```text
/// dots_per_mm = dpi / 25.4
///
/// For XP-365B:
///   dots_per_mm = 203 / 25.4 ≈ 8
///   60mm label = 480 dots
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PrinterConfig {
    /// Printer model name, as the spooler usually reports it
    pub name: &'static str,

    /// Resolution in dots per inch
    pub dpi: u16,

    /// Gap between labels in millimeters (GAP command)
    pub gap_mm: f32,

    /// Narrowest media the printer accepts, in millimeters
    pub min_width_mm: f32,

    /// Widest media the printer accepts, in millimeters
    pub max_width_mm: f32,
}

impl PrinterConfig {
    /// # Xprinter XP-365B Configuration
    ///
    /// Direct thermal label printer, gap/black-mark sensing, speaks TSPL.
    pub const XP365B: Self = Self {
        name: "Xprinter XP-365B",
        dpi: 203,
        gap_mm: 2.0,
        min_width_mm: 20.0,
        max_width_mm: 82.0,
    };

    /// Calculate dots per millimeter
    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / MM_PER_INCH
    }

    /// Convert millimeters to dots (rounded)
    #[inline]
    pub fn mm_to_dots(&self, mm: f32) -> u32 {
        (mm * self.dots_per_mm()).round() as u32
    }

    /// Convert dots to millimeters
    #[inline]
    pub fn dots_to_mm(&self, dots: u32) -> f32 {
        dots as f32 / self.dots_per_mm()
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::XP365B
    }
}

// ============================================================================
// LABEL SPEC
// ============================================================================

/// Physical label geometry.
///
/// Immutable once built. The DPI is the printer's native resolution so that
/// one rendered pixel is one printed dot and bar widths survive printing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelSpec {
    width_mm: f32,
    height_mm: f32,
    dpi: u16,
}

impl LabelSpec {
    /// Build a spec. Each side must lie in `(0, MAX_LABEL_MM]`.
    pub fn new(width_mm: f32, height_mm: f32, dpi: u16) -> Result<Self, LabelError> {
        let valid = |mm: f32| mm > 0.0 && mm <= MAX_LABEL_MM;
        if !(valid(width_mm) && valid(height_mm)) {
            return Err(LabelError::Config(format!(
                "Label dimensions must be between 0 and {}mm, got {}x{}mm",
                MAX_LABEL_MM, width_mm, height_mm
            )));
        }
        if dpi == 0 {
            return Err(LabelError::Config("DPI must be positive".to_string()));
        }
        Ok(Self {
            width_mm,
            height_mm,
            dpi,
        })
    }

    /// Spec at the native resolution of the given printer.
    pub fn for_printer(
        width_mm: f32,
        height_mm: f32,
        printer: &PrinterConfig,
    ) -> Result<Self, LabelError> {
        Self::new(width_mm, height_mm, printer.dpi)
    }

    pub fn width_mm(&self) -> f32 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f32 {
        self.height_mm
    }

    pub fn dpi(&self) -> u16 {
        self.dpi
    }

    /// Canvas width in pixels: `round(width_mm / 25.4 * dpi)`.
    pub fn width_px(&self) -> u32 {
        Self::round_px(self.width_mm, self.dpi)
    }

    /// Canvas height in pixels: `round(height_mm / 25.4 * dpi)`.
    pub fn height_px(&self) -> u32 {
        Self::round_px(self.height_mm, self.dpi)
    }

    /// Portrait labels are taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.width_px() < self.height_px()
    }

    fn round_px(mm: f32, dpi: u16) -> u32 {
        ((mm / MM_PER_INCH * dpi as f32).round() as u32).max(1)
    }
}

// ============================================================================
// TESTS
// ============================================================================
