//! Code 128 glyph rendering.
//!
//! Uses the barcoders crate for symbol encoding and draws the bare bar
//! pattern (no human-readable text) into an RGB image. Character sets are
//! planned per value (digit runs packed into set C), so the glyph size
//! depends on the symbol length and the fixed [`GlyphParams`].

use barcoders::sym::code128::Code128;
use image::{Rgb, RgbImage};

use crate::error::LabelError;
use crate::printer::config::MM_PER_INCH;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Fixed rendering parameters for label glyphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphParams {
    /// Width of one module (narrowest bar) in millimeters
    pub module_width_mm: f32,
    /// Bar height in millimeters
    pub bar_height_mm: f32,
    /// Blank margin left and right of the symbol, in millimeters
    pub quiet_zone_mm: f32,
}

impl GlyphParams {
    /// Thin modules and short bars so a full token fits a 60mm label.
    pub const LABEL: Self = Self {
        module_width_mm: 0.25,
        bar_height_mm: 8.0,
        quiet_zone_mm: 1.0,
    };

    /// Module width in whole dots (at least one).
    pub fn module_px(&self, dpi: u16) -> u32 {
        to_px(self.module_width_mm, dpi).max(1)
    }

    pub fn bar_height_px(&self, dpi: u16) -> u32 {
        to_px(self.bar_height_mm, dpi).max(1)
    }

    pub fn quiet_zone_px(&self, dpi: u16) -> u32 {
        to_px(self.quiet_zone_mm, dpi)
    }
}

impl Default for GlyphParams {
    fn default() -> Self {
        Self::LABEL
    }
}

fn to_px(mm: f32, dpi: u16) -> u32 {
    (mm / MM_PER_INCH * dpi as f32).round() as u32
}

/// Code 128 character sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSet {
    /// Uppercase, digits, punctuation, ASCII control characters
    A,
    /// Uppercase, lowercase, digits, punctuation
    B,
    /// Digit pairs
    C,
}

impl CodeSet {
    /// Start or switch marker understood by barcoders.
    fn marker(self) -> char {
        match self {
            Self::A => '\u{00C0}',
            Self::B => '\u{0181}',
            Self::C => '\u{0106}',
        }
    }

    /// The set a character forces, `None` when A and B both hold it.
    fn required_by(c: char) -> Option<Self> {
        match c as u32 {
            0..=31 => Some(Self::A),
            96..=127 => Some(Self::B),
            _ => None,
        }
    }
}

/// Minimum digit run worth packing into set C.
///
/// A run that is the whole value pays off at two digits, one touching
/// either end at four, one in the middle at six.
fn set_c_threshold(at_start: bool, at_end: bool) -> usize {
    match (at_start, at_end) {
        (true, true) => 2,
        (true, false) | (false, true) => 4,
        (false, false) => 6,
    }
}

/// Plan the character sets for `data` and return barcoders input.
///
/// Even digit runs go to set C; control characters force set A, lowercase
/// forces set B. The result starts with a set marker and switches sets
/// inline.
pub fn plan_code_sets(data: &str) -> Result<String, LabelError> {
    if data.is_empty() {
        return Err(LabelError::Encoding("Barcode value is empty".to_string()));
    }
    if let Some(bad) = data.chars().find(|c| !c.is_ascii()) {
        return Err(LabelError::Encoding(format!(
            "Character {:?} cannot be encoded in Code 128",
            bad
        )));
    }

    let chars: Vec<char> = data.chars().collect();
    let mut out = String::with_capacity(data.len() + 4);
    let mut current: Option<CodeSet> = None;
    let mut i = 0;

    while i < chars.len() {
        let run = chars[i..].iter().take_while(|c| c.is_ascii_digit()).count();
        let even = run - run % 2;
        if even > 0 && even >= set_c_threshold(i == 0, i + run == chars.len()) {
            if run % 2 == 1 {
                // Odd digit leads in A or B
                let set = current.filter(|s| *s != CodeSet::C).unwrap_or(CodeSet::B);
                if current != Some(set) {
                    out.push(set.marker());
                    current = Some(set);
                }
                out.push(chars[i]);
                i += 1;
            }
            if current != Some(CodeSet::C) {
                out.push(CodeSet::C.marker());
                current = Some(CodeSet::C);
            }
            out.extend(&chars[i..i + even]);
            i += even;
            continue;
        }

        let c = chars[i];
        let set = match (current, CodeSet::required_by(c)) {
            (Some(cur), None) if cur != CodeSet::C => cur,
            (Some(cur), Some(needed)) if cur == needed => cur,
            (_, Some(needed)) => needed,
            (_, None) => chars[i + 1..]
                .iter()
                .find_map(|&c| CodeSet::required_by(c))
                .unwrap_or(CodeSet::B),
        };
        if current != Some(set) {
            out.push(set.marker());
            current = Some(set);
        }
        // barcoders spells DEL as ÷ in set B
        out.push(if c == '\u{7f}' { '\u{00F7}' } else { c });
        i += 1;
    }

    Ok(out)
}

/// Encode data as Code 128 modules.
///
/// Returns one entry per module, `true` = bar (black). Any ASCII value is
/// accepted; sets are chosen by [`plan_code_sets`].
pub fn encode_code128(data: &str) -> Result<Vec<bool>, LabelError> {
    let planned = plan_code_sets(data)?;
    let barcode = Code128::new(&planned)
        .map_err(|e| LabelError::Encoding(format!("Code 128 rejected {:?}: {}", data, e)))?;

    Ok(barcode.encode().into_iter().map(|m| m == 1).collect())
}

/// Render the bare barcode glyph for a value.
///
/// ```text
/// ┌quiet┬──── modules × module_px ────┬quiet┐
/// │     │ █ ██ █  ███ █ ██  █ ███ ██  │     │  bar_height_px
/// └─────┴─────────────────────────────┴─────┘
/// ```
pub fn render_glyph(data: &str, params: &GlyphParams, dpi: u16) -> Result<RgbImage, LabelError> {
    let modules = encode_code128(data)?;

    let module_px = params.module_px(dpi);
    let quiet = params.quiet_zone_px(dpi);
    let height = params.bar_height_px(dpi);
    let width = modules.len() as u32 * module_px + quiet * 2;

    let mut glyph = RgbImage::from_pixel(width, height, WHITE);
    for (i, _) in modules.iter().enumerate().filter(|(_, bar)| **bar) {
        let x0 = quiet + i as u32 * module_px;
        for x in x0..x0 + module_px {
            for y in 0..height {
                glyph.put_pixel(x, y, BLACK);
            }
        }
    }

    Ok(glyph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code128_encoding() {
        let bars = encode_code128("Hello").unwrap();
        assert!(!bars.is_empty());
        assert!(bars.iter().any(|&b| b));
        // Symbols start with a bar
        assert!(bars[0]);
    }

    #[test]
    fn test_code128_length_grows_with_value() {
        // start(11) + n*11 + check(11) + stop(13)
        let short = encode_code128("A").unwrap();
        let long = encode_code128("ABC123").unwrap();
        assert_eq!(long.len() - short.len(), 5 * 11);
    }

    #[test]
    fn test_empty_value_rejected() {
        assert!(matches!(encode_code128(""), Err(LabelError::Encoding(_))));
    }

    #[test]
    fn test_non_ascii_rejected() {
        assert!(matches!(
            encode_code128("ÉLÈVE"),
            Err(LabelError::Encoding(_))
        ));
        // Set markers in the value itself are not passed through
        assert!(encode_code128("\u{0106}12").is_err());
    }

    #[test]
    fn test_numeric_value_packed_in_set_c() {
        assert_eq!(plan_code_sets("12345678").unwrap(), "\u{0106}12345678");
        // start + 4 pairs + check (11 each) + stop (13)
        assert_eq!(encode_code128("12345678").unwrap().len(), 79);

        let glyph = render_glyph("12345678", &GlyphParams::LABEL, 203).unwrap();
        assert_eq!(glyph.width(), 79 * 2 + 16);
    }

    #[test]
    fn test_odd_digit_run_leads_in_set_b() {
        assert_eq!(plan_code_sets("12345").unwrap(), "\u{0181}1\u{0106}2345");
        assert_eq!(
            plan_code_sets("EX2024001234").unwrap(),
            "\u{0181}EX\u{0106}2024001234"
        );
    }

    #[test]
    fn test_short_digit_runs_stay_in_set_b() {
        assert_eq!(plan_code_sets("ABC123").unwrap(), "\u{0181}ABC123");
        assert_eq!(plan_code_sets("A1234B").unwrap(), "\u{0181}A1234B");
    }

    #[test]
    fn test_control_characters_use_set_a() {
        assert_eq!(plan_code_sets("A\tB").unwrap(), "\u{00C0}A\tB");
        assert_eq!(
            plan_code_sets("a\tb").unwrap(),
            "\u{0181}a\u{00C0}\t\u{0181}b"
        );
        assert_eq!(encode_code128("A\tB").unwrap().len(), 5 * 11 + 13);
    }

    #[test]
    fn test_mixed_value_shorter_than_set_b() {
        let value = "AB1234567890";
        let modules = encode_code128(value).unwrap().len();
        assert!(modules < 11 * (value.len() + 2) + 13);
    }

    #[test]
    fn test_label_params_at_203_dpi() {
        let p = GlyphParams::LABEL;
        assert_eq!(p.module_px(203), 2);
        assert_eq!(p.bar_height_px(203), 64);
        assert_eq!(p.quiet_zone_px(203), 8);
    }

    #[test]
    fn test_glyph_dimensions() {
        let modules = encode_code128("ABC123").unwrap().len() as u32;
        let glyph = render_glyph("ABC123", &GlyphParams::LABEL, 203).unwrap();
        assert_eq!(glyph.width(), modules * 2 + 16);
        assert_eq!(glyph.height(), 64);
    }

    #[test]
    fn test_glyph_quiet_zone_is_white() {
        let glyph = render_glyph("X1", &GlyphParams::LABEL, 203).unwrap();
        for x in 0..8 {
            assert_eq!(*glyph.get_pixel(x, 10), WHITE);
        }
        assert_eq!(*glyph.get_pixel(8, 10), BLACK);
    }
}
