//! # Printer Spooler
//!
//! Discovery and raw job submission through the CUPS command line tools.
//!
//! ## Printer Names
//!
//! The configured name is resolved against the installed printers: an exact
//! match wins, otherwise the first printer whose name contains the requested
//! one (case-insensitive) is used. `"xprinter"` finds `"Xprinter_XP-365B"`.
//!
//! ## Targets
//!
//! ```text
//! PrinterTarget::Spooler("Xprinter_XP-365B")  → lp -d Xprinter_XP-365B -t job -o raw
//! PrinterTarget::Device("/dev/usb/lp0")       → bytes written to the device node
//! ```

use image::{Rgb, RgbImage};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::LabelError;
use crate::printer::config::MM_PER_INCH;
use crate::printer::mm_to_pixels;
use crate::render::CaptionFont;

/// Chunk size for device node writes (bytes)
const CHUNK_SIZE: usize = 4096;

/// Delay between chunks (milliseconds)
const CHUNK_DELAY_MS: u64 = 2;

/// Test page size in pixels.
pub const TEST_PAGE_WIDTH: u32 = 400;
pub const TEST_PAGE_HEIGHT: u32 = 200;

/// Where raw job bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterTarget {
    /// A named queue of the system spooler
    Spooler(String),
    /// A printer device node such as `/dev/usb/lp0`
    Device(PathBuf),
}

impl PrinterTarget {
    /// Spooler targets are names; absolute paths are devices.
    pub fn parse(s: &str) -> Self {
        if s.starts_with('/') {
            Self::Device(PathBuf::from(s))
        } else {
            Self::Spooler(s.to_string())
        }
    }
}

/// Names of all printers known to the spooler.
pub fn list_printers() -> Result<Vec<String>, LabelError> {
    let output = Command::new("lpstat")
        .arg("-e")
        .output()
        .map_err(|e| LabelError::Connectivity(format!("Failed to run 'lpstat -e': {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // No printers installed is reported as an error by some CUPS versions
        if stderr.contains("No destinations") {
            return Ok(Vec::new());
        }
        return Err(LabelError::Connectivity(format!(
            "lpstat failed: {}",
            stderr.trim()
        )));
    }

    Ok(parse_printer_list(&String::from_utf8_lossy(&output.stdout)))
}

/// The spooler's default printer, if one is set.
pub fn default_printer() -> Option<String> {
    let output = Command::new("lpstat").arg("-d").output().ok()?;
    parse_default_printer(&String::from_utf8_lossy(&output.stdout))
}

fn parse_printer_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `system default destination: NAME`
fn parse_default_printer(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.split_once("destination:"))
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Points per inch, the unit of CUPS page sizes and margins.
const POINTS_PER_INCH: f32 = 72.0;

/// Media a spooler queue is set up for, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueMedia {
    pub width_mm: f32,
    pub height_mm: f32,
    /// Unprintable margins: left, top, right, bottom
    pub margins_mm: [f32; 4],
}

impl QueueMedia {
    /// Printable area in whole dots at `dpi`.
    pub fn printable_px(&self, dpi: u16) -> (u32, u32) {
        let [left, top, right, bottom] = self.margins_mm;
        (
            mm_to_pixels((self.width_mm - left - right).max(0.0), dpi),
            mm_to_pixels((self.height_mm - top - bottom).max(0.0), dpi),
        )
    }
}

/// Media size and margins of a queue, from `lpoptions -p NAME`.
///
/// `None` when the spooler cannot be asked or reports no usable size.
pub fn queue_media(printer: &str) -> Option<QueueMedia> {
    let output = Command::new("lpoptions").args(["-p", printer]).output().ok()?;
    if !output.status.success() {
        debug!(
            "lpoptions -p {} failed: {}",
            printer,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    parse_queue_options(&String::from_utf8_lossy(&output.stdout))
}

/// Read `media=`/`PageSize=` and the `page-*` margins (points) from an
/// `lpoptions` line.
fn parse_queue_options(stdout: &str) -> Option<QueueMedia> {
    let options = split_options(stdout);
    let value = |key: &str| {
        options
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v.as_str())
    };

    let (width_mm, height_mm) = ["media", "PageSize"]
        .iter()
        .filter_map(|key| value(key))
        .flat_map(|v| v.split(','))
        .find_map(parse_media_size)?;

    let margin = |key: &str| {
        value(key)
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|pt| pt.is_finite() && *pt >= 0.0)
            .map_or(0.0, points_to_mm)
    };

    Some(QueueMedia {
        width_mm,
        height_mm,
        margins_mm: [
            margin("page-left"),
            margin("page-top"),
            margin("page-right"),
            margin("page-bottom"),
        ],
    })
}

/// `key=value` pairs, values optionally in single quotes.
fn split_options(line: &str) -> Vec<(String, String)> {
    let mut options = Vec::new();
    let mut rest = line.trim();
    while let Some((key, tail)) = rest.split_once('=') {
        let (value, next) = match tail.strip_prefix('\'') {
            Some(quoted) => match quoted.split_once('\'') {
                Some((value, next)) => (value, next),
                None => (quoted, ""),
            },
            None => tail.split_once(' ').unwrap_or((tail, "")),
        };
        options.push((key.trim().to_string(), value.to_string()));
        rest = next.trim_start();
    }
    options
}

/// Size of a media name in millimeters.
///
/// Understands PWG self-describing names (`custom_60x40mm_60x40mm`,
/// `na_index-4x6_4x6in`), PPD sizes in points (`w170h113`) and CUPS custom
/// sizes (`Custom.60x40mm`).
fn parse_media_size(name: &str) -> Option<(f32, f32)> {
    let name = name.trim();

    if let Some(dims) = name.strip_prefix('w') {
        if let Some((w, h)) = dims.split_once('h') {
            if let (Ok(w), Ok(h)) = (w.parse::<f32>(), h.parse::<f32>()) {
                return positive(points_to_mm(w), points_to_mm(h));
            }
        }
    }

    let dims = name
        .strip_prefix("Custom.")
        .or_else(|| name.rsplit('_').next())?;
    let (scale, dims) = if let Some(d) = dims.strip_suffix("mm") {
        (1.0, d)
    } else if let Some(d) = dims.strip_suffix("in") {
        (MM_PER_INCH, d)
    } else if let Some(d) = dims.strip_suffix("cm") {
        (10.0, d)
    } else {
        return None;
    };
    let (w, h) = dims.split_once('x')?;
    positive(w.parse::<f32>().ok()? * scale, h.parse::<f32>().ok()? * scale)
}

fn positive(w: f32, h: f32) -> Option<(f32, f32)> {
    (w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0).then_some((w, h))
}

fn points_to_mm(points: f32) -> f32 {
    points / POINTS_PER_INCH * MM_PER_INCH
}

/// Resolve a configured printer name against the installed printers.
///
/// ```
/// use seatlabel::transport::spooler::resolve_printer;
///
/// let installed = vec!["Office Laser".to_string(), "Xprinter_XP-365B".to_string()];
/// assert_eq!(resolve_printer("xprinter", &installed).unwrap(), "Xprinter_XP-365B");
/// assert!(resolve_printer("zebra", &installed).is_err());
/// ```
pub fn resolve_printer(requested: &str, available: &[String]) -> Result<String, LabelError> {
    if let Some(exact) = available.iter().find(|p| p.as_str() == requested) {
        return Ok(exact.clone());
    }

    let needle = requested.to_lowercase();
    let partial = available
        .iter()
        .find(|p| !needle.is_empty() && p.to_lowercase().contains(&needle));
    if let Some(partial) = partial {
        info!("Printer '{}' matched by name to '{}'", requested, partial);
        return Ok(partial.clone());
    }

    Err(LabelError::DeviceUnavailable {
        requested: requested.to_string(),
        available: available.to_vec(),
    })
}

/// Send raw bytes to a printer, bypassing any driver.
pub fn send_raw(target: &PrinterTarget, data: &[u8], job_name: &str) -> Result<(), LabelError> {
    match target {
        PrinterTarget::Spooler(name) => spool_raw(name, data, job_name),
        PrinterTarget::Device(path) => write_device(path, data),
    }
}

fn spool_raw(printer: &str, data: &[u8], job_name: &str) -> Result<(), LabelError> {
    let mut child = Command::new("lp")
        .args(["-d", printer, "-t", job_name, "-o", "raw"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| LabelError::Connectivity(format!("Failed to run lp: {}", e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(data)
            .map_err(|e| LabelError::Connectivity(format!("Failed to send job: {}", e)))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| LabelError::Connectivity(format!("lp did not finish: {}", e)))?;

    if !output.status.success() {
        return Err(LabelError::Connectivity(format!(
            "lp rejected job '{}': {}",
            job_name,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    info!(
        "Spooled '{}' to {} ({} bytes): {}",
        job_name,
        printer,
        data.len(),
        String::from_utf8_lossy(&output.stdout).trim()
    );
    Ok(())
}

fn write_device(path: &Path, data: &[u8]) -> Result<(), LabelError> {
    let mut file = OpenOptions::new().write(true).open(path).map_err(|e| {
        LabelError::Connectivity(format!("Failed to open {}: {}", path.display(), e))
    })?;

    for chunk in data.chunks(CHUNK_SIZE) {
        file.write_all(chunk)
            .map_err(|e| LabelError::Connectivity(format!("Write failed: {}", e)))?;
        if data.len() > CHUNK_SIZE {
            thread::sleep(Duration::from_millis(CHUNK_DELAY_MS));
        }
    }

    file.flush()
        .map_err(|e| LabelError::Connectivity(format!("Flush failed: {}", e)))?;

    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// A small raster page naming the printer, for checking alignment.
pub fn test_page(printer_name: &str, font: &CaptionFont) -> RgbImage {
    let mut page = RgbImage::from_pixel(TEST_PAGE_WIDTH, TEST_PAGE_HEIGHT, Rgb([255, 255, 255]));

    // 1px frame marks the page edge
    for x in 0..TEST_PAGE_WIDTH {
        page.put_pixel(x, 0, Rgb([0, 0, 0]));
        page.put_pixel(x, TEST_PAGE_HEIGHT - 1, Rgb([0, 0, 0]));
    }
    for y in 0..TEST_PAGE_HEIGHT {
        page.put_pixel(0, y, Rgb([0, 0, 0]));
        page.put_pixel(TEST_PAGE_WIDTH - 1, y, Rgb([0, 0, 0]));
    }

    let (_, line_h) = font.measure(printer_name);
    font.draw(&mut page, 10, 10, printer_name);
    font.draw(&mut page, 10, 10 + line_h as i64 + 10, "Test Print");
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn installed() -> Vec<String> {
        vec![
            "Office_Laser".to_string(),
            "Xprinter_XP-365B".to_string(),
            "xprinter".to_string(),
        ]
    }

    #[test]
    fn test_media_size_names() {
        assert_eq!(parse_media_size("custom_60x40mm_60x40mm"), Some((60.0, 40.0)));
        assert_eq!(parse_media_size("Custom.50x30mm"), Some((50.0, 30.0)));
        assert_eq!(parse_media_size("na_index-4x6_4x6in"), Some((101.6, 152.4)));
        let (w, h) = parse_media_size("w170h113").unwrap();
        assert!((w - 59.97).abs() < 0.01 && (h - 39.86).abs() < 0.01);
        assert_eq!(parse_media_size("A4"), None);
        assert_eq!(parse_media_size("custom_0x40mm_0x40mm"), None);
    }

    #[test]
    fn test_queue_options_with_margins() {
        let line = "copies=1 device-uri=usb://Xprinter/XP-365B \
                    media=custom_80x50mm_80x50mm page-left=14.17 page-right=14.17 \
                    printer-info='Xprinter XP-365B' printer-is-shared=false";
        let media = parse_queue_options(line).unwrap();
        assert_eq!((media.width_mm, media.height_mm), (80.0, 50.0));
        assert!((media.margins_mm[0] - 5.0).abs() < 0.01);
        assert_eq!(media.margins_mm[1], 0.0);
        // 70mm x 50mm printable at 203 dpi
        assert_eq!(media.printable_px(203), (559, 399));
    }

    #[test]
    fn test_queue_options_without_size() {
        assert_eq!(parse_queue_options("copies=1 printer-info='Label Printer'"), None);
        assert_eq!(parse_queue_options(""), None);
    }

    #[test]
    fn test_quoted_options_split() {
        assert_eq!(
            split_options("a=1 printer-info='Hall A Printer' b=2"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("printer-info".to_string(), "Hall A Printer".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_exact_match_preferred() {
        assert_eq!(resolve_printer("xprinter", &installed()).unwrap(), "xprinter");
    }

    #[test]
    fn test_substring_match_case_insensitive() {
        assert_eq!(
            resolve_printer("XP-365", &installed()).unwrap(),
            "Xprinter_XP-365B"
        );
        assert_eq!(resolve_printer("laser", &installed()).unwrap(), "Office_Laser");
    }

    #[test]
    fn test_no_match_lists_available() {
        match resolve_printer("Zebra", &installed()) {
            Err(LabelError::DeviceUnavailable {
                requested,
                available,
            }) => {
                assert_eq!(requested, "Zebra");
                assert_eq!(available.len(), 3);
            }
            other => panic!("expected DeviceUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_request_only_matches_exactly() {
        assert!(resolve_printer("", &installed()).is_err());
    }

    #[test]
    fn test_parse_lpstat_output() {
        assert_eq!(
            parse_printer_list("Office_Laser\nXprinter_XP-365B\n\n"),
            vec!["Office_Laser", "Xprinter_XP-365B"]
        );
        assert_eq!(
            parse_default_printer("system default destination: Office_Laser\n"),
            Some("Office_Laser".to_string())
        );
        assert_eq!(parse_default_printer("no system default destination\n"), None);
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(
            PrinterTarget::parse("/dev/usb/lp0"),
            PrinterTarget::Device(PathBuf::from("/dev/usb/lp0"))
        );
        assert_eq!(
            PrinterTarget::parse("Xprinter"),
            PrinterTarget::Spooler("Xprinter".to_string())
        );
    }

    #[test]
    fn test_send_raw_to_device_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lp0");
        std::fs::write(&path, b"").unwrap();

        send_raw(&PrinterTarget::Device(path.clone()), b"CLS", "job").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"CLS");
    }

    #[test]
    fn test_send_raw_missing_device() {
        let result = send_raw(
            &PrinterTarget::Device(PathBuf::from("/nonexistent/lp9")),
            b"CLS",
            "job",
        );
        assert!(matches!(result, Err(LabelError::Connectivity(_))));
    }

    #[test]
    fn test_test_page_has_ink() {
        let page = test_page("Xprinter", &CaptionFont::builtin());
        assert_eq!(page.dimensions(), (TEST_PAGE_WIDTH, TEST_PAGE_HEIGHT));
        let inner_dark = page
            .enumerate_pixels()
            .filter(|(x, y, p)| {
                *x > 0 && *y > 0 && *x < TEST_PAGE_WIDTH - 1 && *y < TEST_PAGE_HEIGHT - 1 && p[0] < 128
            })
            .count();
        assert!(inner_dark > 0);
    }
}
