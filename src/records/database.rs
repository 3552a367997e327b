//! Registration database record store.
//!
//! Reads the live exam tables over the MySQL protocol. The joins match the
//! JSON export read by [`JsonRecordStore`](super::JsonRecordStore), so both
//! stores answer the same queries with the same rows.
//!
//! Each query opens its own connection and drops it on return.

use chrono::NaiveDate;
use mysql::prelude::{FromRow, Queryable};
use mysql::{Conn, Opts, OptsBuilder, Params, Row, from_row_opt};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{RecordSource, ScanResult, Semester, StudentRecord, compare_seats};
use crate::config::DatabaseSettings;
use crate::error::LabelError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns of [`StudentRecord`], in field order.
const RECORD_COLUMNS: &str = "CAST(eb.StudentID AS CHAR), eb.Barcode, CAST(eb.SeatNo AS CHAR), \
     tv.VenueName, CAST(eb.StudentLevel AS CHAR), eth.ModuleCode, eth.SemesterCode";

const RECORD_JOIN: &str = "FROM exam_barcode eb \
     JOIN exam_timetable_hall eth ON eb.ExamHallID = eth.EntryID \
     JOIN timetable_venue tv ON eth.VenueID = tv.EntryID";

type RecordRow = (
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
);

/// Record store backed by the registration database.
#[derive(Debug, Clone)]
pub struct MySqlRecordStore {
    settings: DatabaseSettings,
}

impl MySqlRecordStore {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    /// Connection options; blank user, password or schema are left unset.
    pub fn opts(&self) -> Opts {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        OptsBuilder::new()
            .ip_or_hostname(Some(self.settings.host.clone()))
            .tcp_port(self.settings.port)
            .user(non_empty(&self.settings.user))
            .pass(non_empty(&self.settings.password))
            .db_name(non_empty(&self.settings.database))
            .tcp_connect_timeout(Some(CONNECT_TIMEOUT))
            .into()
    }

    fn connect(&self) -> Result<Conn, LabelError> {
        debug!(
            "Connecting to {}:{}/{}",
            self.settings.host, self.settings.port, self.settings.database
        );
        Conn::new(self.opts()).map_err(|e| {
            LabelError::Connectivity(format!(
                "Cannot connect to database at {}:{}: {}",
                self.settings.host, self.settings.port, e
            ))
        })
    }

    /// Run a parameterised query and convert every row.
    fn select<T: FromRow>(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<T>, LabelError> {
        let mut conn = self.connect()?;
        let rows: Vec<Row> = conn.exec(sql, params).map_err(query_error)?;
        rows.into_iter().map(convert).collect()
    }

    fn select_first<T: FromRow>(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Option<T>, LabelError> {
        let mut conn = self.connect()?;
        let row: Option<Row> = conn.exec_first(sql, params).map_err(query_error)?;
        row.map(convert).transpose()
    }
}

fn query_error(e: mysql::Error) -> LabelError {
    LabelError::Connectivity(format!("Database query error: {}", e))
}

fn convert<T: FromRow>(row: Row) -> Result<T, LabelError> {
    from_row_opt(row).map_err(|e| LabelError::Connectivity(format!("Unexpected row: {}", e)))
}

/// `DATE_FORMAT(..., '%Y-%m-%d')` output; anything else is dropped.
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

fn into_record(row: RecordRow) -> StudentRecord {
    let (student_id, barcode, seat_no, venue_name, student_level, module_code, semester_code) = row;
    StudentRecord {
        student_id,
        barcode,
        seat_no: seat_no.unwrap_or_default(),
        venue_name,
        student_level,
        module_code,
        semester_code,
    }
}

impl RecordSource for MySqlRecordStore {
    fn test_connection(&self) -> Result<(), LabelError> {
        let mut conn = self.connect()?;
        conn.query_drop("SELECT 1").map_err(query_error)?;
        info!("Database connection test successful");
        Ok(())
    }

    fn semesters(&self) -> Result<Vec<Semester>, LabelError> {
        let rows: Vec<Row> = self.select(
            "SELECT * FROM timetable_semester ORDER BY EntryID DESC",
            Params::Empty,
        )?;
        let semesters: Vec<Semester> = rows
            .into_iter()
            .filter_map(|row| {
                Some(Semester {
                    entry_id: row.get_opt("EntryID")?.ok()?,
                    semester_code: row.get_opt("SemesterCode")?.ok()?,
                    semester_name: row
                        .get_opt::<Option<String>, _>("SemesterName")
                        .and_then(Result::ok)
                        .flatten(),
                })
            })
            .collect();
        info!("Retrieved {} semesters", semesters.len());
        Ok(semesters)
    }

    fn exam_dates(&self, semester_code: &str) -> Result<Vec<NaiveDate>, LabelError> {
        let rows: Vec<Option<String>> = self.select(
            "SELECT DISTINCT DATE_FORMAT(ExamDate, '%Y-%m-%d') FROM exam_timetable \
             WHERE SemesterCode = ? AND ExamDate IS NOT NULL ORDER BY 1",
            (semester_code,),
        )?;
        let dates: Vec<NaiveDate> = rows.iter().flatten().filter_map(|d| parse_date(d)).collect();
        info!("Retrieved {} exam dates for {}", dates.len(), semester_code);
        Ok(dates)
    }

    fn modules_by_semester(&self, semester_code: &str) -> Result<Vec<String>, LabelError> {
        let modules: Vec<String> = self.select(
            "SELECT DISTINCT ModuleCode FROM exam_timetable_hall \
             WHERE SemesterCode = ? ORDER BY ModuleCode",
            (semester_code,),
        )?;
        info!(
            "Retrieved {} modules for semester {}",
            modules.len(),
            semester_code
        );
        Ok(modules)
    }

    fn modules_by_date(
        &self,
        exam_date: NaiveDate,
        semester_code: &str,
    ) -> Result<Vec<String>, LabelError> {
        let modules: Vec<String> = self.select(
            "SELECT DISTINCT eth.ModuleCode FROM exam_timetable_hall eth \
             JOIN exam_timetable et ON eth.ModuleCode = et.ModuleCode \
             AND eth.SemesterCode = et.SemesterCode \
             WHERE et.ExamDate = ? AND eth.SemesterCode = ? ORDER BY eth.ModuleCode",
            (exam_date.format("%Y-%m-%d").to_string(), semester_code),
        )?;
        info!("Retrieved {} modules for date {}", modules.len(), exam_date);
        Ok(modules)
    }

    fn module_name(&self, module_code: &str) -> Result<Option<String>, LabelError> {
        let name = self
            .select_first::<Option<String>>("SELECT getmodulename(?)", (module_code,))?
            .flatten()
            .filter(|n| !n.trim().is_empty());
        match &name {
            Some(n) => info!("Retrieved module name for {}: {}", module_code, n),
            None => warn!("No module name found for {}", module_code),
        }
        Ok(name)
    }

    fn students(
        &self,
        module_code: &str,
        semester_code: &str,
    ) -> Result<Vec<StudentRecord>, LabelError> {
        let sql = format!(
            "SELECT {} {} WHERE eth.ModuleCode = ? AND eth.SemesterCode = ? ORDER BY eb.SeatNo",
            RECORD_COLUMNS, RECORD_JOIN
        );
        let rows: Vec<RecordRow> = self.select(&sql, (module_code, semester_code))?;
        let mut records: Vec<StudentRecord> = rows.into_iter().map(into_record).collect();
        // SeatNo may be a text column; keep numeric seat order either way.
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
        let sql = format!(
            "SELECT {} {} WHERE eb.Barcode = ? OR eb.StudentID = ? LIMIT 1",
            RECORD_COLUMNS, RECORD_JOIN
        );
        let Some(row) = self.select_first::<RecordRow>(&sql, (code, code))? else {
            return Ok(None);
        };
        let record = into_record(row);

        let exam_date = self
            .select_first::<Option<String>>(
                "SELECT DATE_FORMAT(ExamDate, '%Y-%m-%d') FROM exam_timetable \
                 WHERE ModuleCode = ? AND SemesterCode = ? AND ExamDate IS NOT NULL \
                 ORDER BY EntryID LIMIT 1",
                (record.module_code.as_str(), record.semester_code.as_str()),
            )?
            .flatten()
            .and_then(|d| parse_date(&d));

        Ok(Some(ScanResult { record, exam_date }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DatabaseSettings {
        DatabaseSettings {
            host: "db.example.edu".into(),
            port: 3307,
            user: "exams".into(),
            password: "secret".into(),
            database: "registration".into(),
        }
    }

    #[test]
    fn test_opts_from_settings() {
        let opts = MySqlRecordStore::new(settings()).opts();
        assert_eq!(opts.get_ip_or_hostname(), "db.example.edu");
        assert_eq!(opts.get_tcp_port(), 3307);
        assert_eq!(opts.get_user(), Some("exams"));
        assert_eq!(opts.get_pass(), Some("secret"));
        assert_eq!(opts.get_db_name(), Some("registration"));
    }

    #[test]
    fn test_blank_credentials_left_unset() {
        let opts = MySqlRecordStore::new(DatabaseSettings {
            password: String::new(),
            database: String::new(),
            ..settings()
        })
        .opts();
        assert_eq!(opts.get_pass(), None);
        assert_eq!(opts.get_db_name(), None);
        assert_eq!(opts.get_user(), Some("exams"));
    }

    #[test]
    fn test_unreachable_server_is_connectivity_error() {
        let store = MySqlRecordStore::new(DatabaseSettings {
            host: "127.0.0.1".into(),
            port: 1,
            ..settings()
        });
        assert!(matches!(
            store.test_connection(),
            Err(LabelError::Connectivity(_))
        ));
        assert!(matches!(
            store.students("CS101", "2025S1"),
            Err(LabelError::Connectivity(_))
        ));
    }

    #[test]
    fn test_record_row_conversion() {
        let record = into_record((
            "2024001".into(),
            Some("X1".into()),
            None,
            "Hall A".into(),
            Some("3".into()),
            "CS101".into(),
            "2025S1".into(),
        ));
        assert_eq!(record.seat_no, "");
        assert_eq!(record.display_line(), "X1 - Seat  - Hall A");
    }

    #[test]
    fn test_formatted_dates() {
        assert_eq!(
            parse_date("2025-06-02"),
            NaiveDate::from_ymd_opt(2025, 6, 2)
        );
        assert_eq!(parse_date("0000-00-00"), None);
    }
}
