//! File-backed record store.
//!
//! The store is a JSON export of the exam tables:
//!
//! ```json
//! {
//!   "timetable_semester":  [{"EntryID": 3, "SemesterCode": "2025S1"}],
//!   "exam_timetable":      [{"EntryID": 1, "ModuleCode": "CS101", "SemesterCode": "2025S1", "ExamDate": "2025-06-02"}],
//!   "exam_timetable_hall": [{"EntryID": 5, "ModuleCode": "CS101", "SemesterCode": "2025S1", "VenueID": 2}],
//!   "timetable_venue":     [{"EntryID": 2, "VenueName": "Hall A"}],
//!   "exam_barcode":        [{"StudentID": "S1", "Barcode": "X1", "SeatNo": 1, "ExamHallID": 5}],
//!   "modules":             [{"ModuleCode": "CS101", "ModuleName": "Programming I"}]
//! }
//! ```
//!
//! Queries reproduce the joins of the registration database:
//! `exam_barcode.ExamHallID → exam_timetable_hall.EntryID`,
//! `exam_timetable_hall.VenueID → timetable_venue.EntryID`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{RecordSource, ScanResult, Semester, StudentRecord, compare_seats, string_or_number};
use crate::error::LabelError;

/// Row of `exam_timetable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableRow {
    #[serde(rename = "EntryID")]
    pub entry_id: u64,
    #[serde(rename = "ModuleCode")]
    pub module_code: String,
    #[serde(rename = "SemesterCode")]
    pub semester_code: String,
    #[serde(rename = "ExamDate", default)]
    pub exam_date: Option<NaiveDate>,
}

/// Row of `exam_timetable_hall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallRow {
    #[serde(rename = "EntryID")]
    pub entry_id: u64,
    #[serde(rename = "ModuleCode")]
    pub module_code: String,
    #[serde(rename = "SemesterCode")]
    pub semester_code: String,
    #[serde(rename = "VenueID")]
    pub venue_id: u64,
}

/// Row of `timetable_venue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueRow {
    #[serde(rename = "EntryID")]
    pub entry_id: u64,
    #[serde(rename = "VenueName")]
    pub venue_name: String,
}

/// Row of `exam_barcode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodeRow {
    #[serde(rename = "StudentID", deserialize_with = "string_or_number")]
    pub student_id: String,
    #[serde(rename = "Barcode", default)]
    pub barcode: Option<String>,
    #[serde(rename = "SeatNo", default, deserialize_with = "string_or_number")]
    pub seat_no: String,
    #[serde(rename = "StudentLevel", default)]
    pub student_level: Option<String>,
    #[serde(rename = "ExamHallID")]
    pub exam_hall_id: u64,
}

/// Row of `modules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRow {
    #[serde(rename = "ModuleCode")]
    pub module_code: String,
    #[serde(rename = "ModuleName")]
    pub module_name: String,
}

/// All tables of one export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub timetable_semester: Vec<Semester>,
    pub exam_timetable: Vec<TimetableRow>,
    pub exam_timetable_hall: Vec<HallRow>,
    pub timetable_venue: Vec<VenueRow>,
    pub exam_barcode: Vec<BarcodeRow>,
    pub modules: Vec<ModuleRow>,
}

impl Snapshot {
    /// Barcode rows joined with their hall and venue, in table order.
    ///
    /// Rows whose hall or venue is missing drop out, as with an inner join.
    fn joined(&self) -> Vec<StudentRecord> {
        let halls: HashMap<u64, &HallRow> = self
            .exam_timetable_hall
            .iter()
            .map(|h| (h.entry_id, h))
            .collect();
        let venues: HashMap<u64, &VenueRow> = self
            .timetable_venue
            .iter()
            .map(|v| (v.entry_id, v))
            .collect();

        self.exam_barcode
            .iter()
            .filter_map(|row| {
                let hall = halls.get(&row.exam_hall_id)?;
                let venue = venues.get(&hall.venue_id)?;
                Some(StudentRecord {
                    student_id: row.student_id.clone(),
                    barcode: row.barcode.clone(),
                    seat_no: row.seat_no.clone(),
                    venue_name: venue.venue_name.clone(),
                    student_level: row.student_level.clone(),
                    module_code: hall.module_code.clone(),
                    semester_code: hall.semester_code.clone(),
                })
            })
            .collect()
    }
}

/// Record store backed by a JSON export file.
///
/// Each query reads the file afresh; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    path: PathBuf,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the store and read all tables.
    fn open(&self) -> Result<Snapshot, LabelError> {
        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            LabelError::Connectivity(format!(
                "Cannot open record store {}: {}",
                self.path.display(),
                e
            ))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            LabelError::Connectivity(format!(
                "Record store {} is unreadable: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl RecordSource for JsonRecordStore {
    fn test_connection(&self) -> Result<(), LabelError> {
        self.open()?;
        info!("Record store connection test successful");
        Ok(())
    }

    fn semesters(&self) -> Result<Vec<Semester>, LabelError> {
        let mut semesters = self.open()?.timetable_semester;
        semesters.sort_by(|a, b| b.entry_id.cmp(&a.entry_id));
        info!("Retrieved {} semesters", semesters.len());
        Ok(semesters)
    }

    fn exam_dates(&self, semester_code: &str) -> Result<Vec<NaiveDate>, LabelError> {
        let dates: BTreeSet<NaiveDate> = self
            .open()?
            .exam_timetable
            .iter()
            .filter(|t| t.semester_code == semester_code)
            .filter_map(|t| t.exam_date)
            .collect();
        info!("Retrieved {} exam dates for {}", dates.len(), semester_code);
        Ok(dates.into_iter().collect())
    }

    fn modules_by_semester(&self, semester_code: &str) -> Result<Vec<String>, LabelError> {
        let modules: BTreeSet<String> = self
            .open()?
            .exam_timetable_hall
            .into_iter()
            .filter(|h| h.semester_code == semester_code)
            .map(|h| h.module_code)
            .collect();
        info!(
            "Retrieved {} modules for semester {}",
            modules.len(),
            semester_code
        );
        Ok(modules.into_iter().collect())
    }

    fn modules_by_date(
        &self,
        exam_date: NaiveDate,
        semester_code: &str,
    ) -> Result<Vec<String>, LabelError> {
        let snapshot = self.open()?;
        let scheduled: BTreeSet<(&str, &str)> = snapshot
            .exam_timetable
            .iter()
            .filter(|t| t.exam_date == Some(exam_date))
            .map(|t| (t.module_code.as_str(), t.semester_code.as_str()))
            .collect();

        let modules: BTreeSet<String> = snapshot
            .exam_timetable_hall
            .iter()
            .filter(|h| h.semester_code == semester_code)
            .filter(|h| scheduled.contains(&(h.module_code.as_str(), h.semester_code.as_str())))
            .map(|h| h.module_code.clone())
            .collect();
        info!("Retrieved {} modules for date {}", modules.len(), exam_date);
        Ok(modules.into_iter().collect())
    }

    fn module_name(&self, module_code: &str) -> Result<Option<String>, LabelError> {
        let name = self
            .open()?
            .modules
            .into_iter()
            .find(|m| m.module_code == module_code)
            .map(|m| m.module_name);
        if name.is_none() {
            warn!("No module name found for {}", module_code);
        }
        Ok(name)
    }

    fn students(
        &self,
        module_code: &str,
        semester_code: &str,
    ) -> Result<Vec<StudentRecord>, LabelError> {
        let mut records: Vec<StudentRecord> = self
            .open()?
            .joined()
            .into_iter()
            .filter(|r| r.module_code == module_code && r.semester_code == semester_code)
            .collect();
        records.sort_by(|a, b| compare_seats(&a.seat_no, &b.seat_no));

        if records.is_empty() {
            warn!("No barcode data found for module {}", module_code);
        } else {
            info!(
                "Retrieved {} barcode records for module {}",
                records.len(),
                module_code
            );
        }
        Ok(records)
    }

    fn lookup(&self, code: &str) -> Result<Option<ScanResult>, LabelError> {
        let snapshot = self.open()?;
        let Some(record) = snapshot
            .joined()
            .into_iter()
            .find(|r| r.barcode.as_deref() == Some(code) || r.student_id == code)
        else {
            return Ok(None);
        };

        let exam_date = snapshot
            .exam_timetable
            .iter()
            .find(|t| t.module_code == record.module_code && t.semester_code == record.semester_code)
            .and_then(|t| t.exam_date);

        Ok(Some(ScanResult { record, exam_date }))
    }
}
