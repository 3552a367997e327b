//! Print jobs built from [`Settings`].
//!
//! Each job resolves the configured printer, opens it, sends, and lets it go.
//! Nothing is held between jobs.

use image::DynamicImage;
use tracing::info;

use crate::config::Settings;
use crate::error::LabelError;
use crate::output::{CommandOutput, RecordOutput};
use crate::printer::{PrinterConfig, mm_to_offset};
use crate::protocol::tspl::{MediaSize, Script};
use crate::records::StudentRecord;
use crate::transport::{
    JobReport, PageDevice, PrinterTarget, SpoolPageDevice, resolve_printer, send_raw, spooler,
    transmit,
};

/// The printer `settings` point at.
///
/// Device paths are used as given; names go through [`resolve_printer`].
pub fn resolve_target(settings: &Settings) -> Result<PrinterTarget, LabelError> {
    match PrinterTarget::parse(&settings.printer_name) {
        PrinterTarget::Device(path) => Ok(PrinterTarget::Device(path)),
        PrinterTarget::Spooler(name) => {
            let installed = spooler::list_printers()?;
            Ok(PrinterTarget::Spooler(resolve_printer(&name, &installed)?))
        }
    }
}

/// Media of the configured label on the configured printer.
pub fn media_size(settings: &Settings) -> MediaSize {
    MediaSize {
        width_mm: settings.label_width_mm,
        height_mm: settings.label_height_mm,
        gap_mm: PrinterConfig::XP365B.gap_mm,
    }
}

/// Caller offsets in device pixels.
pub fn offsets(settings: &Settings) -> (i32, i32) {
    let dpi = PrinterConfig::XP365B.dpi;
    (
        mm_to_offset(settings.offset_x_mm, dpi),
        mm_to_offset(settings.offset_y_mm, dpi),
    )
}

/// Build the command script for `records` and send it as one raw job.
pub fn print_commands(
    records: &[StudentRecord],
    settings: &Settings,
    job_name: &str,
) -> Result<Script, LabelError> {
    let script = CommandOutput::new(media_size(settings), settings.missing_barcode).produce(records);
    if script.emitted.is_empty() {
        info!("No labels to print");
        return Ok(script);
    }

    let target = resolve_target(settings)?;
    send_raw(&target, &script.to_bytes(), job_name)?;
    info!("Printed {} label(s) via {:?}", script.emitted.len(), target);
    Ok(script)
}

/// Print label images through the spooler, one page each.
pub fn print_raster(
    images: &[DynamicImage],
    settings: &Settings,
    job_name: &str,
) -> Result<JobReport, LabelError> {
    let printer = match resolve_target(settings)? {
        PrinterTarget::Spooler(name) => name,
        PrinterTarget::Device(path) => {
            return Err(LabelError::Config(format!(
                "Raster printing needs a spooler queue, not device {}",
                path.display()
            )));
        }
    };

    let mut device = SpoolPageDevice::new(printer, &settings.label_spec()?)?;
    print_to_device(&mut device, images, settings, job_name)
}

/// Print label images on any page device.
pub fn print_to_device(
    device: &mut dyn PageDevice,
    images: &[DynamicImage],
    settings: &Settings,
    job_name: &str,
) -> Result<JobReport, LabelError> {
    transmit(device, images, offsets(settings), job_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DirectoryPageDevice;
    use image::RgbImage;

    #[test]
    fn test_offsets_in_dots() {
        let settings = Settings {
            offset_x_mm: 2.0,
            offset_y_mm: -1.0,
            ..Default::default()
        };
        assert_eq!(offsets(&settings), (15, -7));
    }

    #[test]
    fn test_media_from_settings() {
        let media = media_size(&Settings::default());
        assert_eq!(media, MediaSize::default());
    }

    #[test]
    fn test_commands_to_device_file() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("lp0");
        std::fs::write(&device, b"").unwrap();

        // Device paths bypass printer discovery
        let settings = Settings {
            printer_name: device.display().to_string(),
            ..Default::default()
        };
        let records = vec![StudentRecord {
            student_id: "1".into(),
            barcode: Some("X1".into()),
            venue_name: "Hall A".into(),
            ..Default::default()
        }];

        let script = print_commands(&records, &settings, "test").unwrap();
        assert_eq!(std::fs::read(&device).unwrap(), script.to_bytes());
    }

    #[test]
    fn test_raster_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        let mut device = DirectoryPageDevice::for_label(dir.path(), &settings.label_spec().unwrap());
        let images = vec![DynamicImage::ImageRgb8(RgbImage::new(480, 320)); 2];

        let report = print_to_device(&mut device, &images, &settings, "labels").unwrap();
        assert_eq!(report.printed(), 2);
        assert_eq!(device.written().len(), 2);
    }
}
