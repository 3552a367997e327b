//! # Page Devices
//!
//! A page device accepts whole documents of raster pages, each page built
//! from images drawn at device-pixel positions.
//!
//! ```text
//! start_doc ─┬─ start_page → draw … → end_page ─┬─ end_doc
//!            └──────────────── per page ─────────┘
//! ```
//!
//! A page whose drawing failed is dropped with `abort_page` instead of
//! being ended, so no blank label comes out for it.
//!
//! [`DirectoryPageDevice`] saves every page as a DPI-tagged PNG.
//! [`SpoolPageDevice`] renders pages the same way into a temporary directory
//! and submits them to the spooler as one job at `end_doc`. Its printable
//! area is the queue's media less its margins, as CUPS reports them.

use image::{Rgb, RgbImage, imageops};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::LabelError;
use crate::printer::LabelSpec;
use crate::render::save_png;
use crate::transport::spooler;

/// Something that prints pages.
pub trait PageDevice {
    /// Printable area in device pixels.
    fn printable_area(&self) -> (u32, u32);

    /// Device resolution in dots per inch.
    fn dpi(&self) -> u16;

    fn start_doc(&mut self, job_name: &str) -> Result<(), LabelError>;

    fn start_page(&mut self) -> Result<(), LabelError>;

    /// Draw `image` stretched to `width` × `height` with its top-left corner
    /// at (`x`, `y`). Parts outside the printable area are clipped.
    fn draw(
        &mut self,
        image: &RgbImage,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<(), LabelError>;

    fn end_page(&mut self) -> Result<(), LabelError>;

    /// Drop the current page without printing it.
    fn abort_page(&mut self) -> Result<(), LabelError>;

    fn end_doc(&mut self) -> Result<(), LabelError>;
}

/// Writes each page to `<dir>/<job>-<n>.png`.
#[derive(Debug)]
pub struct DirectoryPageDevice {
    dir: PathBuf,
    width: u32,
    height: u32,
    dpi: u16,
    job_name: String,
    page: Option<RgbImage>,
    written: Vec<PathBuf>,
}

impl DirectoryPageDevice {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32, dpi: u16) -> Self {
        Self {
            dir: dir.into(),
            width: width.max(1),
            height: height.max(1),
            dpi,
            job_name: "job".to_string(),
            page: None,
            written: Vec::new(),
        }
    }

    /// A device whose pages are the size of one label.
    pub fn for_label(dir: impl Into<PathBuf>, spec: &LabelSpec) -> Self {
        Self::new(dir, spec.width_px(), spec.height_px(), spec.dpi())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in page order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PageDevice for DirectoryPageDevice {
    fn printable_area(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn dpi(&self) -> u16 {
        self.dpi
    }

    fn start_doc(&mut self, job_name: &str) -> Result<(), LabelError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            LabelError::Connectivity(format!("Cannot open {}: {}", self.dir.display(), e))
        })?;
        self.job_name = sanitize(job_name);
        self.written.clear();
        Ok(())
    }

    fn start_page(&mut self) -> Result<(), LabelError> {
        self.page = Some(RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([255, 255, 255]),
        ));
        Ok(())
    }

    fn draw(
        &mut self,
        image: &RgbImage,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<(), LabelError> {
        let page = self
            .page
            .as_mut()
            .ok_or_else(|| LabelError::Image("draw outside of a page".to_string()))?;

        if width == 0 || height == 0 {
            return Err(LabelError::Image(format!(
                "empty destination {}x{}",
                width, height
            )));
        }

        if image.dimensions() == (width, height) {
            imageops::overlay(page, image, x as i64, y as i64);
        } else {
            let scaled = imageops::resize(image, width, height, imageops::FilterType::Lanczos3);
            imageops::overlay(page, &scaled, x as i64, y as i64);
        }
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), LabelError> {
        let page = self
            .page
            .take()
            .ok_or_else(|| LabelError::Image("end_page without start_page".to_string()))?;
        let path = self
            .dir
            .join(format!("{}-{:03}.png", self.job_name, self.written.len() + 1));
        save_png(&page, self.dpi, &path)?;
        debug!("Wrote page {}", path.display());
        self.written.push(path);
        Ok(())
    }

    fn abort_page(&mut self) -> Result<(), LabelError> {
        if self.page.take().is_some() {
            debug!("Discarded page {}", self.written.len() + 1);
        }
        Ok(())
    }

    fn end_doc(&mut self) -> Result<(), LabelError> {
        info!(
            "Job '{}': {} page(s) in {}",
            self.job_name,
            self.written.len(),
            self.dir.display()
        );
        Ok(())
    }
}

/// Renders pages to a temporary directory and prints them in one spooler job.
#[derive(Debug)]
pub struct SpoolPageDevice {
    printer: String,
    job_name: String,
    inner: DirectoryPageDevice,
    // Keeps the directory alive until the job is submitted
    _scratch: TempDir,
}

impl SpoolPageDevice {
    /// Device for a spooler queue.
    ///
    /// The printable area comes from the queue's media settings; when the
    /// spooler reports none, the label size is used.
    pub fn new(printer: impl Into<String>, spec: &LabelSpec) -> Result<Self, LabelError> {
        let printer = printer.into();
        let area = match spooler::queue_media(&printer) {
            Some(media) => {
                let area = media.printable_px(spec.dpi());
                info!(
                    "Queue {} media {}x{}mm, printable {}x{} dots",
                    printer, media.width_mm, media.height_mm, area.0, area.1
                );
                area
            }
            None => {
                warn!(
                    "Queue {} reports no media size, using the {}x{}mm label",
                    printer,
                    spec.width_mm(),
                    spec.height_mm()
                );
                (spec.width_px(), spec.height_px())
            }
        };
        Self::with_area(printer, area, spec.dpi())
    }

    /// Device with a known printable area in dots.
    pub fn with_area(
        printer: impl Into<String>,
        (width, height): (u32, u32),
        dpi: u16,
    ) -> Result<Self, LabelError> {
        let scratch = tempfile::tempdir()?;
        Ok(Self {
            printer: printer.into(),
            job_name: String::new(),
            inner: DirectoryPageDevice::new(scratch.path(), width, height, dpi),
            _scratch: scratch,
        })
    }

    pub fn printer(&self) -> &str {
        &self.printer
    }
}

impl PageDevice for SpoolPageDevice {
    fn printable_area(&self) -> (u32, u32) {
        self.inner.printable_area()
    }

    fn dpi(&self) -> u16 {
        self.inner.dpi()
    }

    fn start_doc(&mut self, job_name: &str) -> Result<(), LabelError> {
        self.job_name = job_name.to_string();
        self.inner.start_doc(job_name)
    }

    fn start_page(&mut self) -> Result<(), LabelError> {
        self.inner.start_page()
    }

    fn draw(
        &mut self,
        image: &RgbImage,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<(), LabelError> {
        self.inner.draw(image, x, y, width, height)
    }

    fn end_page(&mut self) -> Result<(), LabelError> {
        self.inner.end_page()
    }

    fn abort_page(&mut self) -> Result<(), LabelError> {
        self.inner.abort_page()
    }

    fn end_doc(&mut self) -> Result<(), LabelError> {
        let pages = self.inner.written();
        if pages.is_empty() {
            info!("Job '{}' has no pages, nothing sent", self.job_name);
            return Ok(());
        }

        let output = Command::new("lp")
            .args(["-d", &self.printer, "-t", &self.job_name])
            .args(pages)
            .output()
            .map_err(|e| LabelError::Connectivity(format!("Failed to run lp: {}", e)))?;

        if !output.status.success() {
            return Err(LabelError::Connectivity(format!(
                "lp rejected job '{}': {}",
                self.job_name,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(
            "Sent {} page(s) to {} as '{}'",
            pages.len(),
            self.printer,
            self.job_name
        );
        Ok(())
    }
}

/// Job names become file names.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_device_writes_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = DirectoryPageDevice::new(dir.path(), 100, 50, 203);

        device.start_doc("CS101 labels").unwrap();
        for _ in 0..2 {
            device.start_page().unwrap();
            let black = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
            device.draw(&black, 5, 5, 20, 20).unwrap();
            device.end_page().unwrap();
        }
        device.end_doc().unwrap();

        assert_eq!(device.written().len(), 2);
        assert!(device.written()[0].ends_with("CS101_labels-001.png"));

        let page = image::open(&device.written()[1]).unwrap().to_rgb8();
        assert_eq!(page.dimensions(), (100, 50));
        assert_eq!(page.get_pixel(15, 15), &Rgb([0, 0, 0]));
        assert_eq!(page.get_pixel(50, 40), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_draw_clips_outside_area() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = DirectoryPageDevice::new(dir.path(), 20, 20, 203);
        device.start_doc("clip").unwrap();
        device.start_page().unwrap();
        let black = RgbImage::from_pixel(30, 30, Rgb([0, 0, 0]));
        device.draw(&black, -5, 10, 30, 30).unwrap();
        device.end_page().unwrap();
    }

    #[test]
    fn test_draw_without_page_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = DirectoryPageDevice::new(dir.path(), 20, 20, 203);
        let img = RgbImage::new(1, 1);
        assert!(matches!(
            device.draw(&img, 0, 0, 1, 1),
            Err(LabelError::Image(_))
        ));
    }

    #[test]
    fn test_label_sized_device() {
        let spec = LabelSpec::new(60.0, 40.0, 203).unwrap();
        let device = DirectoryPageDevice::for_label("/tmp/unused", &spec);
        assert_eq!(device.printable_area(), (480, 320));
        assert_eq!(device.dpi(), 203);
    }

    #[test]
    fn test_aborted_page_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = DirectoryPageDevice::new(dir.path(), 20, 20, 203);
        device.start_doc("abort").unwrap();

        device.start_page().unwrap();
        assert!(device.draw(&RgbImage::new(4, 4), 0, 0, 0, 4).is_err());
        device.abort_page().unwrap();

        device.start_page().unwrap();
        device.draw(&RgbImage::new(4, 4), 0, 0, 4, 4).unwrap();
        device.end_page().unwrap();
        device.end_doc().unwrap();

        assert_eq!(device.written().len(), 1);
        assert!(device.written()[0].ends_with("abort-001.png"));
        assert!(matches!(device.end_page(), Err(LabelError::Image(_))));
    }

    #[test]
    fn test_spool_device_area() {
        let device = SpoolPageDevice::with_area("Xprinter", (559, 399), 203).unwrap();
        assert_eq!(device.printable_area(), (559, 399));
        assert_eq!(device.printer(), "Xprinter");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("CS101 / 2024"), "CS101___2024");
        assert_eq!(sanitize(""), "job");
    }
}
