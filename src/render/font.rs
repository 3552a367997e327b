//! Text rendering for label captions.
//!
//! A caption is drawn with a TrueType font when one can be found (an
//! explicit path, then a list of common system locations) and with the
//! built-in Spleen 6x12 bitmap font otherwise. Loading never fails: a
//! missing or unreadable font file just selects the bitmap fallback.

use ab_glyph::{Font, FontArc, ScaleFont};
use image::RgbImage;
use spleen_font::{FONT_6X12, PSF2Font};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Caption height in pixels for TrueType fonts.
pub const CAPTION_PIXEL_HEIGHT: f32 = 16.0;

const SPLEEN_WIDTH: u32 = 6;
const SPLEEN_HEIGHT: u32 = 12;

/// Common locations of a plain sans-serif font.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "C:\\Windows\\Fonts\\arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Font used to draw the human-readable caption under the glyph.
#[derive(Clone)]
pub enum CaptionFont {
    /// Anti-aliased TrueType font at a fixed pixel height
    Ttf { font: FontArc, pixel_height: f32 },
    /// Spleen 6x12 bitmap font compiled into the binary
    Bitmap,
}

impl std::fmt::Debug for CaptionFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ttf { pixel_height, .. } => {
                write!(f, "CaptionFont::Ttf({}px)", pixel_height)
            }
            Self::Bitmap => write!(f, "CaptionFont::Bitmap"),
        }
    }
}

impl CaptionFont {
    /// The built-in bitmap font.
    pub fn builtin() -> Self {
        Self::Bitmap
    }

    /// Load a caption font, preferring `explicit`, then system fonts.
    pub fn load(explicit: Option<&Path>) -> Self {
        let candidates = explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

        for path in candidates {
            if let Some(font) = Self::from_file(&path) {
                debug!("Caption font: {}", path.display());
                return font;
            }
        }

        warn!("No TrueType font found, using built-in bitmap font");
        Self::Bitmap
    }

    /// Load a TrueType font file, `None` if missing or invalid.
    pub fn from_file(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        match FontArc::try_from_vec(bytes) {
            Ok(font) => Some(Self::Ttf {
                font,
                pixel_height: CAPTION_PIXEL_HEIGHT,
            }),
            Err(e) => {
                warn!("Ignoring unreadable font {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Size of the text block `(width, height)` in pixels.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match self {
            Self::Ttf { font, pixel_height } => {
                let scaled = font.as_scaled(*pixel_height);
                let width: f32 = text
                    .chars()
                    .map(|ch| scaled.h_advance(font.glyph_id(ch)))
                    .sum();
                let height = (scaled.ascent() - scaled.descent()).ceil();
                (width.ceil() as u32, height.max(1.0) as u32)
            }
            Self::Bitmap => (text.chars().count() as u32 * SPLEEN_WIDTH, SPLEEN_HEIGHT),
        }
    }

    /// Draw black text with its top-left corner at `(x, y)`.
    ///
    /// Pixels outside the image are clipped.
    pub fn draw(&self, image: &mut RgbImage, x: i64, y: i64, text: &str) {
        match self {
            Self::Ttf { font, pixel_height } => draw_ttf(image, font, *pixel_height, x, y, text),
            Self::Bitmap => draw_bitmap(image, x, y, text),
        }
    }
}

/// Darken a pixel by `coverage` (0.0 = untouched, 1.0 = black).
fn darken(image: &mut RgbImage, x: i64, y: i64, coverage: f32) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    let px = image.get_pixel_mut(x as u32, y as u32);
    let keep = 1.0 - coverage.clamp(0.0, 1.0);
    for channel in px.0.iter_mut() {
        *channel = (*channel as f32 * keep).round() as u8;
    }
}

fn draw_ttf(image: &mut RgbImage, font: &FontArc, pixel_height: f32, x: i64, y: i64, text: &str) {
    let scaled = font.as_scaled(pixel_height);
    let baseline = scaled.ascent();
    let mut caret = 0.0f32;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        let glyph = glyph_id.with_scale_and_position(pixel_height, ab_glyph::point(caret, baseline));
        caret += scaled.h_advance(glyph_id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = x + gx as i64 + bounds.min.x as i64;
                let py = y + gy as i64 + bounds.min.y as i64;
                darken(image, px, py, coverage);
            });
        }
    }
}

fn draw_bitmap(image: &mut RgbImage, x: i64, y: i64, text: &str) {
    let Ok(mut spleen) = PSF2Font::new(FONT_6X12) else {
        return;
    };

    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + (i as u32 * SPLEEN_WIDTH) as i64;
        let utf8 = ch.to_string();
        if let Some(glyph) = spleen.glyph_for_utf8(utf8.as_bytes()) {
            for (row_y, row) in glyph.enumerate() {
                for (col_x, on) in row.enumerate() {
                    if on {
                        darken(image, origin_x + col_x as i64, y + row_y as i64, 1.0);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_bitmap_measure() {
        assert_eq!(CaptionFont::builtin().measure("ABC123"), (36, 12));
        assert_eq!(CaptionFont::builtin().measure(""), (0, 12));
    }

    #[test]
    fn test_bitmap_draw_marks_pixels() {
        let mut img = white(40, 14);
        CaptionFont::builtin().draw(&mut img, 1, 1, "X1");
        assert!(img.pixels().any(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_draw_clips_outside() {
        let mut img = white(10, 10);
        CaptionFont::builtin().draw(&mut img, -30, -30, "WIDE TEXT");
        CaptionFont::builtin().draw(&mut img, 8, 8, "WIDE TEXT");
        assert_eq!(img.dimensions(), (10, 10));
    }

    #[test]
    fn test_missing_font_file_falls_back() {
        let font = CaptionFont::from_file(Path::new("/nonexistent/font.ttf"));
        assert!(font.is_none());
    }

    #[test]
    fn test_invalid_font_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(CaptionFont::from_file(&path).is_none());
    }

    #[test]
    fn test_darken_coverage() {
        let mut img = white(1, 1);
        darken(&mut img, 0, 0, 0.5);
        assert_eq!(img.get_pixel(0, 0).0, [128, 128, 128]);
    }
}
