//! # TSPL Label Commands
//!
//! Builders for the line-oriented TSPL command language spoken by Xprinter,
//! TSC and compatible thermal label printers.
//!
//! ## Script Layout
//!
//! ```text
//! SIZE 60 mm, 40 mm            ┐
//! GAP 2 mm, 0 mm               │ header, once per job
//! DIRECTION 1                  │
//! CLS                          ┘
//! BARCODE 30,30,"128",100,1,0,2,2,"X1"   ┐
//! TEXT 30,150,"3",0,1,1,"Hall A"         │ one block per label
//! PRINT 1                                │
//! CLS                                    ┘
//! ```
//!
//! Lines are joined with `\n`. The barcode is drawn by the printer firmware,
//! not by this crate, so the printed bars can differ slightly from the
//! software preview.
//!
//! ## Coordinates
//!
//! All positions are in dots (8 dots/mm at 203 DPI), origin top-left.

use tracing::warn;

use crate::config::MissingBarcodePolicy;
use crate::records::StudentRecord;

/// Barcode origin in dots.
pub const BARCODE_X: u32 = 30;
pub const BARCODE_Y: u32 = 30;
/// Barcode bar height in dots.
pub const BARCODE_HEIGHT: u32 = 100;
/// Hall name origin in dots, below the barcode and its readable line.
pub const TEXT_X: u32 = 30;
pub const TEXT_Y: u32 = 150;
/// Built-in font "3": 16x24 alphanumeric.
pub const TEXT_FONT: &str = "3";

/// Physical media of a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaSize {
    pub width_mm: f32,
    pub height_mm: f32,
    pub gap_mm: f32,
}

impl Default for MediaSize {
    fn default() -> Self {
        Self {
            width_mm: 60.0,
            height_mm: 40.0,
            gap_mm: 2.0,
        }
    }
}

/// Human-readable line under a barcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Readable {
    None = 0,
    /// Below the bars, left aligned
    #[default]
    Left = 1,
    Center = 2,
    Right = 3,
}

/// Clockwise rotation of barcodes and text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }
}

// ============================================================================
// SETUP COMMANDS
// ============================================================================

/// # Label Size (SIZE)
///
/// `SIZE m mm, n mm` - label width and length.
///
/// ```
/// use seatlabel::protocol::tspl;
///
/// assert_eq!(tspl::size(60.0, 40.0), "SIZE 60 mm, 40 mm");
/// assert_eq!(tspl::size(62.5, 29.0), "SIZE 62.5 mm, 29 mm");
/// ```
pub fn size(width_mm: f32, height_mm: f32) -> String {
    format!("SIZE {} mm, {} mm", width_mm, height_mm)
}

/// # Gap Distance (GAP)
///
/// `GAP m mm, n mm` - vertical gap between labels and its offset.
pub fn gap(gap_mm: f32, offset_mm: f32) -> String {
    format!("GAP {} mm, {} mm", gap_mm, offset_mm)
}

/// # Print Direction (DIRECTION)
///
/// `1` prints with the label head-first out of the printer.
pub fn direction(n: u8) -> String {
    format!("DIRECTION {}", n)
}

/// # Clear Image Buffer (CLS)
pub fn cls() -> String {
    "CLS".to_string()
}

// ============================================================================
// DRAWING COMMANDS
// ============================================================================

/// # 1D Barcode (BARCODE)
///
/// `BARCODE x,y,"type",height,readable,rotation,narrow,wide,"content"`
///
/// ```
/// use seatlabel::protocol::tspl::{self, Readable, Rotation};
///
/// let cmd = tspl::barcode_128(30, 30, 100, Readable::Left, Rotation::None, 2, 2, "X1");
/// assert_eq!(cmd, r#"BARCODE 30,30,"128",100,1,0,2,2,"X1""#);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn barcode_128(
    x: u32,
    y: u32,
    height: u32,
    readable: Readable,
    rotation: Rotation,
    narrow: u8,
    wide: u8,
    content: &str,
) -> String {
    format!(
        "BARCODE {},{},\"128\",{},{},{},{},{},\"{}\"",
        x,
        y,
        height,
        readable as u8,
        rotation.degrees(),
        narrow,
        wide,
        quote(content)
    )
}

/// # Text (TEXT)
///
/// `TEXT x,y,"font",rotation,x-multiplication,y-multiplication,"content"`
pub fn text(
    x: u32,
    y: u32,
    font: &str,
    rotation: Rotation,
    x_mul: u8,
    y_mul: u8,
    content: &str,
) -> String {
    format!(
        "TEXT {},{},\"{}\",{},{},{},\"{}\"",
        x,
        y,
        font,
        rotation.degrees(),
        x_mul,
        y_mul,
        quote(content)
    )
}

/// # Print (PRINT)
///
/// Prints the image buffer `copies` times.
pub fn print(copies: u32) -> String {
    format!("PRINT {}", copies)
}

/// Escape double quotes inside a string operand as `\["]`.
///
/// Control characters become spaces; a line break would end the command.
pub fn quote(content: &str) -> String {
    content
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .replace('"', "\\[\"]")
}

// ============================================================================
// JOB SCRIPT
// ============================================================================

/// Job header: media size, gap, direction, clear buffer.
pub fn header(media: &MediaSize) -> Vec<String> {
    vec![
        size(media.width_mm, media.height_mm),
        gap(media.gap_mm, 0.0),
        direction(1),
        cls(),
    ]
}

/// One label: barcode, hall name, print, clear for the next label.
pub fn label_block(value: &str, venue: &str) -> Vec<String> {
    vec![
        barcode_128(
            BARCODE_X,
            BARCODE_Y,
            BARCODE_HEIGHT,
            Readable::Left,
            Rotation::None,
            2,
            2,
            value,
        ),
        text(TEXT_X, TEXT_Y, TEXT_FONT, Rotation::None, 1, 1, venue),
        print(1),
        cls(),
    ]
}

/// A generated command script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub lines: Vec<String>,
    /// Indices of records that got a label block
    pub emitted: Vec<usize>,
    /// Indices of records left out for lack of a usable barcode value
    pub skipped: Vec<usize>,
}

impl Script {
    /// Script bytes as sent to the printer.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.lines.join("\n").into_bytes()
    }
}

/// Build the command script for a batch of student records.
///
/// Records without a barcode value (after `policy`) and values holding
/// control characters are skipped.
pub fn emit(students: &[StudentRecord], media: &MediaSize, policy: MissingBarcodePolicy) -> Script {
    let mut script = Script {
        lines: header(media),
        ..Default::default()
    };

    for (index, student) in students.iter().enumerate() {
        match policy.value_for(student) {
            Some(value) if value.chars().any(char::is_control) => {
                warn!(
                    "Skipping record {}: barcode {:?} has control characters",
                    index, value
                );
                script.skipped.push(index);
            }
            Some(value) => {
                script
                    .lines
                    .extend(label_block(value, &student.venue_name));
                script.emitted.push(index);
            }
            None => script.skipped.push(index),
        }
    }

    script
}
