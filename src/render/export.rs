//! PNG output with physical resolution.
//!
//! Saved labels carry their DPI in the `pHYs` chunk so that other tools
//! print them at true size.

use image::RgbImage;
use std::io::Cursor;
use std::path::Path;
use tracing::info;

use crate::error::LabelError;
use crate::printer::config::MM_PER_INCH;

/// Convert DPI to pixels per meter, the unit PNG stores.
pub fn dpi_to_ppm(dpi: u16) -> u32 {
    (dpi as f32 * 1000.0 / MM_PER_INCH).round() as u32
}

/// Encode an RGB image as PNG bytes tagged with `dpi`.
pub fn encode_png(image: &RgbImage, dpi: u16) -> Result<Vec<u8>, LabelError> {
    let mut buffer = Cursor::new(Vec::new());

    let mut encoder = png::Encoder::new(&mut buffer, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let ppm = dpi_to_ppm(dpi);
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));

    let mut writer = encoder
        .write_header()
        .map_err(|e| LabelError::Image(format!("Failed to write PNG header: {}", e)))?;

    writer
        .write_image_data(image.as_raw())
        .map_err(|e| LabelError::Image(format!("Failed to write PNG data: {}", e)))?;

    drop(writer);

    Ok(buffer.into_inner())
}

/// Save an RGB image as a DPI-tagged PNG file.
pub fn save_png(image: &RgbImage, dpi: u16, path: &Path) -> Result<(), LabelError> {
    let bytes = encode_png(image, dpi)?;
    std::fs::write(path, bytes)?;
    info!("Saved {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}
