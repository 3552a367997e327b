//! # Raster Print Transmitter
//!
//! Sends rendered label images to a [`PageDevice`], one page per image.
//!
//! ## Placement
//!
//! For an image of `iw × ih` on a printable area of `pw × ph`:
//!
//! ```text
//! scale = min(pw / iw, ph / ih), snapped to 1.0 above 0.9
//! dest  = floor(iw * scale) × floor(ih * scale)
//! x     = centered if pw > dest_w * 1.5, else 0   (+ offset_x)
//! y     = centered if ph > dest_h * 1.5, else 0   (+ offset_y)
//! ```
//!
//! Snapping keeps labels that nearly fit at native size, so bars are not
//! resampled by a few percent. Small labels on wide media are centered.
//!
//! ## Failures
//!
//! A page that fails is logged and reported in the [`JobReport`]; the job
//! moves on to the next image. Failing to start or finish the document
//! fails the whole job.

use image::DynamicImage;
use serde::Serialize;
use tracing::{error, info, warn};

use super::page::PageDevice;
use crate::error::LabelError;

/// Scale factors above this are treated as 1.0.
pub const SNAP_THRESHOLD: f32 = 0.9;

/// An axis is centered when the printable extent exceeds the drawn extent
/// by this factor.
pub const CENTER_RATIO: f32 = 1.5;

/// Where an image lands on the page, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

/// Compute where an image of `image` size goes on a `printable` area.
///
/// ```
/// use seatlabel::transport::raster::place;
///
/// // 480x320 label on a 480x320 page: native size, no offset
/// let p = place((480, 320), (480, 320), (0, 0));
/// assert_eq!((p.x, p.y, p.width, p.height), (0, 0, 480, 320));
/// ```
pub fn place(image: (u32, u32), printable: (u32, u32), offset: (i32, i32)) -> Placement {
    let (iw, ih) = (image.0.max(1) as f32, image.1.max(1) as f32);
    let (pw, ph) = (printable.0 as f32, printable.1 as f32);

    let mut scale = (pw / iw).min(ph / ih);
    if scale > SNAP_THRESHOLD {
        scale = 1.0;
    }

    let width = ((iw * scale).floor() as u32).max(1);
    let height = ((ih * scale).floor() as u32).max(1);

    Placement {
        x: axis_origin(printable.0, width) + offset.0,
        y: axis_origin(printable.1, height) + offset.1,
        width,
        height,
        scale,
    }
}

fn axis_origin(printable: u32, dest: u32) -> i32 {
    if printable as f32 > dest as f32 * CENTER_RATIO {
        ((printable as i64 - dest as i64) / 2) as i32
    } else {
        0
    }
}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    Printed { placement: Placement },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub index: usize,
    pub outcome: PageOutcome,
}

/// Per-page results of a print job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobReport {
    pub pages: Vec<PageResult>,
}

impl JobReport {
    pub fn printed(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::Printed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.pages.len() - self.printed()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::Failed { .. }))
            .map(|p| p.index)
            .collect()
    }
}

/// Print `images` as one job, one page each.
///
/// `offsets` are in device pixels and are added after placement.
pub fn transmit<D: PageDevice + ?Sized>(
    device: &mut D,
    images: &[DynamicImage],
    offsets: (i32, i32),
    job_name: &str,
) -> Result<JobReport, LabelError> {
    device.start_doc(job_name)?;

    let printable = device.printable_area();
    let mut report = JobReport::default();

    for (index, image) in images.iter().enumerate() {
        let rgb = image.to_rgb8();
        let placement = place(rgb.dimensions(), printable, offsets);
        info!(
            "Page {}: {}x{} at ({}, {}) scale {:.2}",
            index + 1,
            placement.width,
            placement.height,
            placement.x,
            placement.y,
            placement.scale
        );

        let outcome = match print_page(device, &rgb, &placement) {
            Ok(()) => PageOutcome::Printed { placement },
            Err(e) => {
                error!("Page {} failed: {}", index + 1, e);
                PageOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        report.pages.push(PageResult { index, outcome });
    }

    device.end_doc()?;

    if report.failed() > 0 {
        warn!(
            "Job '{}': {} printed, {} failed",
            job_name,
            report.printed(),
            report.failed()
        );
    } else {
        info!("Job '{}': {} page(s) printed", job_name, report.printed());
    }
    Ok(report)
}

fn print_page<D: PageDevice + ?Sized>(
    device: &mut D,
    image: &image::RgbImage,
    placement: &Placement,
) -> Result<(), LabelError> {
    device.start_page()?;
    let drawn = device.draw(
        image,
        placement.x,
        placement.y,
        placement.width,
        placement.height,
    );
    match drawn {
        Ok(()) => device.end_page(),
        Err(e) => {
            // A half-drawn page would still feed a label
            if let Err(abort) = device.abort_page() {
                warn!("Could not discard page: {}", abort);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_native_size_not_scaled() {
        let p = place((480, 320), (480, 320), (0, 0));
        assert_eq!(p.scale, 1.0);
        assert_eq!((p.width, p.height), (480, 320));
    }

    #[test]
    fn test_scale_snaps_above_threshold() {
        // 480 / 500 = 0.96 → native size
        let p = place((500, 300), (480, 400), (0, 0));
        assert_eq!(p.scale, 1.0);
        assert_eq!((p.width, p.height), (500, 300));
    }

    #[test]
    fn test_scale_below_threshold_shrinks() {
        let p = place((960, 400), (480, 320), (0, 0));
        assert_eq!(p.scale, 0.5);
        assert_eq!((p.width, p.height), (480, 200));
        // 320 > 200 * 1.5 → centered vertically
        assert_eq!((p.x, p.y), (0, 60));
    }

    #[test]
    fn test_small_image_centered() {
        // 600 > 100 * 1.5 on x; 120 is not > 100 * 1.5 on y
        let p = place((100, 100), (600, 120), (0, 0));
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.x, 250);
        assert_eq!(p.y, 0);
    }

    #[test]
    fn test_offsets_added_after_placement() {
        let p = place((480, 320), (480, 320), (8, -4));
        assert_eq!((p.x, p.y), (8, -4));
    }

    /// Fails every page whose ordinal is in `fail_on`.
    struct FlakyDevice {
        fail_on: Vec<usize>,
        page: usize,
        finished: bool,
        drawn: Vec<(i32, i32, u32, u32)>,
        ended: Vec<usize>,
        aborted: Vec<usize>,
    }

    impl PageDevice for FlakyDevice {
        fn printable_area(&self) -> (u32, u32) {
            (480, 320)
        }
        fn dpi(&self) -> u16 {
            203
        }
        fn start_doc(&mut self, _job_name: &str) -> Result<(), LabelError> {
            Ok(())
        }
        fn start_page(&mut self) -> Result<(), LabelError> {
            self.page += 1;
            Ok(())
        }
        fn draw(
            &mut self,
            _image: &RgbImage,
            x: i32,
            y: i32,
            width: u32,
            height: u32,
        ) -> Result<(), LabelError> {
            if self.fail_on.contains(&self.page) {
                return Err(LabelError::Connectivity("paper jam".into()));
            }
            self.drawn.push((x, y, width, height));
            Ok(())
        }
        fn end_page(&mut self) -> Result<(), LabelError> {
            self.ended.push(self.page);
            Ok(())
        }
        fn abort_page(&mut self) -> Result<(), LabelError> {
            self.aborted.push(self.page);
            Ok(())
        }
        fn end_doc(&mut self) -> Result<(), LabelError> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn test_failed_page_does_not_stop_job() {
        let mut device = FlakyDevice {
            fail_on: vec![2],
            page: 0,
            finished: false,
            drawn: Vec::new(),
            ended: Vec::new(),
            aborted: Vec::new(),
        };
        let images: Vec<DynamicImage> = (0..3)
            .map(|_| DynamicImage::ImageRgb8(RgbImage::new(480, 320)))
            .collect();

        let report = transmit(&mut device, &images, (0, 0), "job").unwrap();

        assert_eq!(report.printed(), 2);
        assert_eq!(report.failed_indices(), vec![1]);
        assert_eq!(device.drawn.len(), 2);
        assert!(device.finished);
        // The failed page is discarded, not ended
        assert_eq!(device.ended, vec![1, 3]);
        assert_eq!(device.aborted, vec![2]);
    }

    struct ClosedDevice;

    impl PageDevice for ClosedDevice {
        fn printable_area(&self) -> (u32, u32) {
            (1, 1)
        }
        fn dpi(&self) -> u16 {
            203
        }
        fn start_doc(&mut self, _job_name: &str) -> Result<(), LabelError> {
            Err(LabelError::Connectivity("offline".into()))
        }
        fn start_page(&mut self) -> Result<(), LabelError> {
            unreachable!()
        }
        fn draw(&mut self, _: &RgbImage, _: i32, _: i32, _: u32, _: u32) -> Result<(), LabelError> {
            unreachable!()
        }
        fn end_page(&mut self) -> Result<(), LabelError> {
            unreachable!()
        }
        fn abort_page(&mut self) -> Result<(), LabelError> {
            unreachable!()
        }
        fn end_doc(&mut self) -> Result<(), LabelError> {
            unreachable!()
        }
    }

    #[test]
    fn test_start_doc_failure_is_fatal() {
        let images = vec![DynamicImage::ImageRgb8(RgbImage::new(10, 10))];
        assert!(matches!(
            transmit(&mut ClosedDevice, &images, (0, 0), "job"),
            Err(LabelError::Connectivity(_))
        ));
    }
}
