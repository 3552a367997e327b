//! # Label Composer
//!
//! Turns a barcode value into a finished label raster.
//!
//! ## Layout
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                  top 15px                  │
//! │ 20px ┌──────────────────────────────┐ 20px │
//! │      │     glyph (centered on the   │      │
//! │      │      whole canvas)           │      │
//! │      └──────────────────────────────┘      │
//! │                 spacing 8px                │
//! │                  ABC123                    │
//! │                 bottom 10px                │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Portrait labels get the glyph rotated 90° so the bars run along the long
//! edge. The glyph is only ever shrunk, never enlarged, so module widths
//! stay at their native dot size whenever the label is big enough.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::debug;

use super::barcode::{GlyphParams, render_glyph};
use super::font::CaptionFont;
use crate::error::LabelError;
use crate::printer::LabelSpec;

/// Horizontal margin on each side, in pixels.
pub const MARGIN_X: u32 = 20;
/// Top margin, in pixels.
pub const MARGIN_TOP: u32 = 15;
/// Bottom margin, in pixels.
pub const MARGIN_BOTTOM: u32 = 10;
/// Gap between glyph and caption, in pixels.
pub const TEXT_SPACING: u32 = 8;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Where the glyph ended up on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphPlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Glyph size before scaling (after rotation)
    pub native_width: u32,
    pub native_height: u32,
    pub rotated: bool,
}

/// A composed label raster plus the geometry used to build it.
#[derive(Debug, Clone)]
pub struct RenderedLabel {
    pub value: String,
    pub image: RgbImage,
    pub glyph: GlyphPlacement,
}

impl RenderedLabel {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Composes labels for one [`LabelSpec`].
///
/// A composer holds no mutable state; composing the same value twice
/// yields identical pixels.
#[derive(Debug, Clone)]
pub struct LabelComposer {
    spec: LabelSpec,
    params: GlyphParams,
    font: CaptionFont,
}

impl LabelComposer {
    pub fn new(spec: LabelSpec, font: CaptionFont) -> Self {
        Self {
            spec,
            params: GlyphParams::LABEL,
            font,
        }
    }

    /// Override the glyph parameters.
    pub fn with_params(mut self, params: GlyphParams) -> Self {
        self.params = params;
        self
    }

    pub fn spec(&self) -> &LabelSpec {
        &self.spec
    }

    /// Area left for the glyph once margins and the caption are reserved.
    ///
    /// Either side may be zero on very small labels.
    pub fn available_area(&self, caption_height: u32) -> (u32, u32) {
        let width = self.spec.width_px().saturating_sub(MARGIN_X * 2);
        let height = self
            .spec
            .height_px()
            .saturating_sub(MARGIN_TOP + MARGIN_BOTTOM + caption_height + TEXT_SPACING);
        (width, height)
    }

    /// Compose the label for `value`.
    pub fn compose(&self, value: &str) -> Result<RenderedLabel, LabelError> {
        let mut glyph = render_glyph(value, &self.params, self.spec.dpi())?;

        let canvas_w = self.spec.width_px();
        let canvas_h = self.spec.height_px();
        let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, WHITE);

        let (text_w, text_h) = self.font.measure(value);
        let (avail_w, avail_h) = self.available_area(text_h);

        let rotated = canvas_w < canvas_h;
        if rotated {
            // Counter-clockwise, bars end up horizontal
            glyph = imageops::rotate270(&glyph);
        }

        let (native_w, native_h) = glyph.dimensions();
        let scale = fit_scale(native_w, native_h, avail_w, avail_h);
        let width = ((native_w as f64 * scale) as u32).max(1);
        let height = ((native_h as f64 * scale) as u32).max(1);

        if (width, height) != (native_w, native_h) {
            glyph = imageops::resize(&glyph, width, height, FilterType::Lanczos3);
        }

        let x = canvas_w.saturating_sub(width) / 2;
        let y = canvas_h.saturating_sub(height) / 2;
        imageops::overlay(&mut canvas, &glyph, x as i64, y as i64);

        let text_x = (canvas_w as i64 - text_w as i64) / 2;
        let text_y = (y + height + TEXT_SPACING) as i64;
        self.font.draw(&mut canvas, text_x, text_y, value);

        debug!(
            "Created label {}: barcode {}x{}px on {}x{}px label",
            value, width, height, canvas_w, canvas_h
        );

        Ok(RenderedLabel {
            value: value.to_string(),
            image: canvas,
            glyph: GlyphPlacement {
                x,
                y,
                width,
                height,
                native_width: native_w,
                native_height: native_h,
                rotated,
            },
        })
    }
}

/// Largest scale ≤ 1.0 that fits `native` into `available`.
fn fit_scale(native_w: u32, native_h: u32, avail_w: u32, avail_h: u32) -> f64 {
    let scale_x = avail_w as f64 / native_w as f64;
    let scale_y = avail_h as f64 / native_h as f64;
    scale_x.min(scale_y).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer(w: f32, h: f32) -> LabelComposer {
        LabelComposer::new(LabelSpec::new(w, h, 203).unwrap(), CaptionFont::builtin())
    }

    #[test]
    fn test_fit_scale_never_upscales() {
        assert_eq!(fit_scale(100, 50, 1000, 1000), 1.0);
        assert_eq!(fit_scale(200, 50, 100, 1000), 0.5);
        assert_eq!(fit_scale(200, 100, 1000, 25), 0.25);
    }

    #[test]
    fn test_landscape_not_rotated() {
        let label = composer(60.0, 40.0).compose("ABC123").unwrap();
        assert_eq!(label.image.dimensions(), (480, 320));
        assert!(!label.glyph.rotated);
        assert!(label.glyph.width > label.glyph.height);
    }

    #[test]
    fn test_portrait_rotated() {
        let label = composer(40.0, 60.0).compose("ABC123").unwrap();
        assert_eq!(label.image.dimensions(), (320, 480));
        assert!(label.glyph.rotated);
        assert!(label.glyph.height > label.glyph.width);
    }

    #[test]
    fn test_glyph_centered_on_canvas() {
        let label = composer(60.0, 40.0).compose("ABC123").unwrap();
        let g = label.glyph;
        assert_eq!(g.x, (480 - g.width) / 2);
        assert_eq!(g.y, (320 - g.height) / 2);
    }

    #[test]
    fn test_long_value_shrinks_to_available_width() {
        let c = composer(60.0, 40.0);
        let label = c.compose("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789").unwrap();
        let (avail_w, _) = c.available_area(12);
        assert!(label.glyph.width <= avail_w);
        assert!(label.glyph.width < label.glyph.native_width);
        assert_eq!(label.image.dimensions(), (480, 320));
    }

    #[test]
    fn test_available_area_saturates() {
        let c = composer(3.0, 3.0);
        assert_eq!(c.available_area(12), (0, 0));
        // Still produces a canvas of the right size
        let label = c.compose("A").unwrap();
        assert_eq!(label.image.dimensions(), (24, 24));
    }

    #[test]
    fn test_caption_below_glyph() {
        let label = composer(60.0, 40.0).compose("X1").unwrap();
        let g = label.glyph;
        let text_top = g.y + g.height + TEXT_SPACING;
        let has_ink = (text_top..text_top + 12)
            .any(|y| (0..480).any(|x| label.image.get_pixel(x, y).0 != [255, 255, 255]));
        assert!(has_ink);
    }

    #[test]
    fn test_empty_value_is_encoding_error() {
        assert!(matches!(
            composer(60.0, 40.0).compose(""),
            Err(LabelError::Encoding(_))
        ));
    }
}
