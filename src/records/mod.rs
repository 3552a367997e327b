//! # Exam Records
//!
//! Read-only access to exam registration data: semesters, exam dates,
//! modules, and the per-student barcode/seat/venue records labels are
//! printed from.
//!
//! ## Browse Flow
//!
//! ```text
//! semesters() → exam_dates(semester) → modules_by_date(date, semester)
//!             → students(module, semester) → labels
//! ```
//!
//! Two stores answer these queries: the registration database
//! ([`MySqlRecordStore`]) and a JSON export of its tables
//! ([`JsonRecordStore`]), used offline and as a test fixture. Every query
//! opens the store, reads, and releases it again. No handle is held between
//! calls.

pub mod database;
pub mod store;

pub use database::MySqlRecordStore;
pub use store::JsonRecordStore;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

use crate::error::LabelError;

/// A teaching semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    #[serde(rename = "EntryID")]
    pub entry_id: u64,
    #[serde(rename = "SemesterCode")]
    pub semester_code: String,
    #[serde(rename = "SemesterName", default)]
    pub semester_name: Option<String>,
}

/// One student's seat assignment for an exam.
///
/// Join of the barcode assignment, the exam hall and the venue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "StudentID", deserialize_with = "string_or_number")]
    pub student_id: String,
    #[serde(rename = "Barcode", default)]
    pub barcode: Option<String>,
    #[serde(rename = "SeatNo", default, deserialize_with = "string_or_number")]
    pub seat_no: String,
    #[serde(rename = "VenueName", default)]
    pub venue_name: String,
    #[serde(rename = "StudentLevel", default)]
    pub student_level: Option<String>,
    #[serde(rename = "ModuleCode", default)]
    pub module_code: String,
    #[serde(rename = "SemesterCode", default)]
    pub semester_code: String,
}

impl StudentRecord {
    /// The barcode value, if present and not blank.
    pub fn barcode_value(&self) -> Option<&str> {
        self.barcode
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }

    /// What a list row shows: barcode (or ID), seat and hall.
    pub fn display_line(&self) -> String {
        format!(
            "{} - Seat {} - {}",
            self.barcode_value().unwrap_or(&self.student_id),
            self.seat_no,
            self.venue_name
        )
    }
}

/// Result of a scan verification lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub record: StudentRecord,
    /// Exam date of the record's module, when scheduled
    pub exam_date: Option<NaiveDate>,
}

/// Source of exam records.
///
/// Implementations must be read-only. Errors reaching the store are
/// [`LabelError::Connectivity`]; an empty result is not an error.
pub trait RecordSource: Send + Sync {
    /// Check that the store can be reached.
    fn test_connection(&self) -> Result<(), LabelError>;

    /// All semesters, most recent first.
    fn semesters(&self) -> Result<Vec<Semester>, LabelError>;

    /// Distinct exam dates of a semester, ascending.
    fn exam_dates(&self, semester_code: &str) -> Result<Vec<NaiveDate>, LabelError>;

    /// Distinct module codes with exam halls in a semester, ascending.
    fn modules_by_semester(&self, semester_code: &str) -> Result<Vec<String>, LabelError>;

    /// Distinct module codes examined on a date, ascending.
    fn modules_by_date(
        &self,
        exam_date: NaiveDate,
        semester_code: &str,
    ) -> Result<Vec<String>, LabelError>;

    /// Display name of a module.
    fn module_name(&self, module_code: &str) -> Result<Option<String>, LabelError>;

    /// Seat records of a module, ordered by seat.
    fn students(
        &self,
        module_code: &str,
        semester_code: &str,
    ) -> Result<Vec<StudentRecord>, LabelError>;

    /// First record whose barcode or student ID equals `code`.
    fn lookup(&self, code: &str) -> Result<Option<ScanResult>, LabelError>;
}

/// Seat order: numeric when both seats are numbers, text otherwise.
pub fn compare_seats(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Accept `"12"` and `12` alike.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_order_numeric() {
        let mut seats = vec!["10", "9", "100", "1"];
        seats.sort_by(|a, b| compare_seats(a, b));
        assert_eq!(seats, vec!["1", "9", "10", "100"]);
    }

    #[test]
    fn test_seat_order_mixed_falls_back_to_text() {
        assert_eq!(compare_seats("A10", "A9"), Ordering::Less);
    }

    #[test]
    fn test_barcode_value_blank_is_none() {
        let mut record = StudentRecord {
            student_id: "S1".into(),
            barcode: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(record.barcode_value(), None);
        record.barcode = Some(" X1 ".into());
        assert_eq!(record.barcode_value(), Some("X1"));
    }

    #[test]
    fn test_record_from_row_json() {
        let record: StudentRecord = serde_json::from_str(
            r#"{"StudentID": 2024001, "Barcode": "X1", "SeatNo": 7, "VenueName": "Hall A"}"#,
        )
        .unwrap();
        assert_eq!(record.student_id, "2024001");
        assert_eq!(record.seat_no, "7");
        assert_eq!(record.display_line(), "X1 - Seat 7 - Hall A");
    }
}
