//! # Settings
//!
//! User settings persisted as JSON and merged over built-in defaults.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "label_width_mm": 60.0,
//!   "label_height_mm": 40.0,
//!   "offset_x_mm": 0.0,
//!   "offset_y_mm": 0.0,
//!   "printer_name": "Xprinter XP-365B",
//!   "records_backend": "mysql",
//!   "database": {
//!     "host": "localhost",
//!     "port": 3306,
//!     "user": "exams",
//!     "password": "secret",
//!     "database": "registration"
//!   }
//! }
//! ```
//!
//! Any key may be omitted; missing keys take their default. Settings are
//! read once at startup and again after every save, and the resulting
//! [`Settings`] value is passed explicitly to the composer and transmitters.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::LabelError;
use crate::printer::{LabelSpec, PrinterConfig};
use crate::records::{JsonRecordStore, MySqlRecordStore, RecordSource, StudentRecord};

/// Default settings file name, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// What to do with a record that has no barcode value.
///
/// Applies to the raster preview and the printer commands alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingBarcodePolicy {
    /// Leave the record out and report it as skipped.
    #[default]
    Skip,
    /// Encode the student ID instead.
    StudentIdFallback,
}

impl MissingBarcodePolicy {
    /// The value to encode for `record`, or `None` to skip it.
    pub fn value_for<'a>(&self, record: &'a StudentRecord) -> Option<&'a str> {
        match (record.barcode_value(), self) {
            (Some(value), _) => Some(value),
            (None, Self::Skip) => None,
            (None, Self::StudentIdFallback) => {
                Some(record.student_id.trim()).filter(|id| !id.is_empty())
            }
        }
    }
}

/// Where exam records are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordBackend {
    /// JSON export of the exam tables at `records_path`
    #[default]
    Snapshot,
    /// The registration database described by `database`
    Mysql,
}

/// Connection details of the registration database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "exams".to_string(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Label width in millimeters
    pub label_width_mm: f32,
    /// Label height in millimeters
    pub label_height_mm: f32,
    /// Horizontal print offset in millimeters (raster printing)
    pub offset_x_mm: f32,
    /// Vertical print offset in millimeters (raster printing)
    pub offset_y_mm: f32,
    /// Printer name; partial, case-insensitive names are accepted
    pub printer_name: String,
    /// Handling of records without a barcode
    pub missing_barcode: MissingBarcodePolicy,
    /// TrueType font for label captions; system fonts are tried otherwise
    pub font_path: Option<PathBuf>,
    /// Record source
    pub records_backend: RecordBackend,
    /// Exported exam tables, for the snapshot backend
    pub records_path: PathBuf,
    /// Registration database, for the MySQL backend
    pub database: DatabaseSettings,
    /// Email addresses allowed to sign in
    pub authorized_users: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            label_width_mm: 60.0,
            label_height_mm: 40.0,
            offset_x_mm: 0.0,
            offset_y_mm: 0.0,
            printer_name: PrinterConfig::XP365B.name.to_string(),
            missing_barcode: MissingBarcodePolicy::Skip,
            font_path: None,
            records_backend: RecordBackend::Snapshot,
            records_path: PathBuf::from("records.json"),
            database: DatabaseSettings::default(),
            authorized_users: Vec::new(),
        }
    }
}

impl Settings {
    /// Reject settings that cannot describe a label.
    ///
    /// Widths outside the printer's media range are accepted with a warning.
    pub fn validate(&self) -> Result<(), LabelError> {
        let spec = self.label_spec()?;
        let printer = PrinterConfig::XP365B;
        if !(printer.min_width_mm..=printer.max_width_mm).contains(&spec.width_mm()) {
            warn!(
                "Label width {} mm is outside the {} media range ({}-{} mm)",
                spec.width_mm(),
                printer.name,
                printer.min_width_mm,
                printer.max_width_mm
            );
        }
        Ok(())
    }

    /// Set one field from its text form, as given on the command line.
    ///
    /// Lists (`authorized_users`) are comma separated; an empty `font_path`
    /// clears it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), LabelError> {
        let value = value.trim();
        match key {
            "label_width_mm" => self.label_width_mm = parse_mm(key, value)?,
            "label_height_mm" => self.label_height_mm = parse_mm(key, value)?,
            "offset_x_mm" => self.offset_x_mm = parse_mm(key, value)?,
            "offset_y_mm" => self.offset_y_mm = parse_mm(key, value)?,
            "printer_name" => self.printer_name = value.to_string(),
            "missing_barcode" => {
                self.missing_barcode = match value {
                    "skip" => MissingBarcodePolicy::Skip,
                    "student_id_fallback" => MissingBarcodePolicy::StudentIdFallback,
                    other => {
                        return Err(LabelError::Config(format!(
                            "missing_barcode must be skip or student_id_fallback, not '{}'",
                            other
                        )));
                    }
                }
            }
            "font_path" => {
                self.font_path = Some(PathBuf::from(value)).filter(|p| !p.as_os_str().is_empty())
            }
            "records_path" => self.records_path = PathBuf::from(value),
            "records_backend" => {
                self.records_backend = match value {
                    "snapshot" => RecordBackend::Snapshot,
                    "mysql" => RecordBackend::Mysql,
                    other => {
                        return Err(LabelError::Config(format!(
                            "records_backend must be snapshot or mysql, not '{}'",
                            other
                        )));
                    }
                }
            }
            "database.host" => self.database.host = value.to_string(),
            "database.port" => {
                self.database.port = value.parse().map_err(|_| {
                    LabelError::Config(format!("database.port must be a port number, not '{}'", value))
                })?
            }
            "database.user" => self.database.user = value.to_string(),
            "database.password" => self.database.password = value.to_string(),
            "database.database" => self.database.database = value.to_string(),
            "authorized_users" => {
                self.authorized_users = value
                    .split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            other => return Err(LabelError::Config(format!("Unknown setting '{}'", other))),
        }
        Ok(())
    }

    /// Open the configured record source.
    pub fn record_source(&self) -> Box<dyn RecordSource> {
        match self.records_backend {
            RecordBackend::Snapshot => Box::new(JsonRecordStore::new(&self.records_path)),
            RecordBackend::Mysql => Box::new(MySqlRecordStore::new(self.database.clone())),
        }
    }

    /// A copy safe to show: the database password is blanked.
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        shown.database.password.clear();
        shown
    }

    /// Label geometry at the printer's native resolution.
    pub fn label_spec(&self) -> Result<LabelSpec, LabelError> {
        LabelSpec::for_printer(
            self.label_width_mm,
            self.label_height_mm,
            &PrinterConfig::XP365B,
        )
    }
}

/// Reads and writes [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults.
    ///
    /// A missing file yields the defaults silently; a corrupt one yields the
    /// defaults with a warning.
    pub fn load(&self) -> Settings {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                warn!("Cannot read {}: {}, using defaults", self.path.display(), e);
                return Settings::default();
            }
        };

        match serde_json::from_str::<Settings>(&data) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "Corrupted {} ({}), using defaults",
                    self.path.display(),
                    e
                );
                Settings::default()
            }
        }
    }

    /// Validate and save settings atomically.
    pub fn save(&self, settings: &Settings) -> Result<(), LabelError> {
        settings.validate()?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let data = serde_json::to_string_pretty(settings)
            .map_err(|e| LabelError::Config(format!("Cannot serialize settings: {}", e)))?;
        atomic_write(&self.path, &data)?;

        info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

fn parse_mm(key: &str, value: &str) -> Result<f32, LabelError> {
    value
        .parse::<f32>()
        .ok()
        .filter(|mm| mm.is_finite())
        .ok_or_else(|| LabelError::Config(format!("{} must be a number, not '{}'", key, value)))
}

fn atomic_write(path: &Path, data: &str) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)
}
