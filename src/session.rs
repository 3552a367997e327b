//! # Operator Session
//!
//! State of one signed-in operator working through the browse flow:
//!
//! ```text
//! login → semester → exam date → module → records → labels → print
//! ```
//!
//! Choosing something earlier in the flow clears everything after it.
//! Signing out clears everything.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::LabelError;
use crate::output::LabelBatch;
use crate::printer::LabelSpec;
use crate::records::StudentRecord;

/// Print state of one record in the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintStatus {
    #[default]
    Pending,
    Printed,
    Failed,
}

/// Labels rendered for the current records, and the geometry they were
/// rendered at.
#[derive(Debug, Clone)]
pub struct HeldLabels {
    pub spec: LabelSpec,
    pub batch: LabelBatch,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<String>,
    semester: Option<String>,
    exam_date: Option<NaiveDate>,
    module: Option<String>,
    records: Vec<StudentRecord>,
    status: Vec<PrintStatus>,
    labels: Option<HeldLabels>,
}

/// Check `email` against the allow-list.
///
/// Comparison ignores case and surrounding whitespace. Addresses without an
/// `@` are refused outright.
pub fn is_authorized(email: &str, allowed: &[String]) -> bool {
    let email = email.trim();
    email.contains('@') && allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(email))
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, email: &str, allowed: &[String]) -> Result<(), LabelError> {
        if !email.contains('@') {
            return Err(LabelError::Unauthorized(format!(
                "'{}' is not an email address",
                email.trim()
            )));
        }
        if !is_authorized(email, allowed) {
            return Err(LabelError::Unauthorized(format!(
                "{} is not on the list of authorized users",
                email.trim()
            )));
        }

        *self = Self::default();
        self.user = Some(email.trim().to_string());
        info!("{} signed in", email.trim());
        Ok(())
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            info!("{} signed out", user);
        }
        *self = Self::default();
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// The signed-in user, or `Unauthorized`.
    pub fn require_user(&self) -> Result<&str, LabelError> {
        self.user()
            .ok_or_else(|| LabelError::Unauthorized("sign in first".to_string()))
    }

    pub fn semester(&self) -> Option<&str> {
        self.semester.as_deref()
    }

    pub fn exam_date(&self) -> Option<NaiveDate> {
        self.exam_date
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn select_semester(&mut self, semester_code: &str) {
        self.semester = Some(semester_code.to_string());
        self.exam_date = None;
        self.module = None;
        self.clear_records();
    }

    pub fn select_date(&mut self, exam_date: NaiveDate) {
        self.exam_date = Some(exam_date);
        self.module = None;
        self.clear_records();
    }

    pub fn select_module(&mut self, module_code: &str) {
        self.module = Some(module_code.to_string());
        self.clear_records();
    }

    /// Replace the records of the current run; all start out pending.
    pub fn set_records(&mut self, records: Vec<StudentRecord>) {
        debug!("Session holds {} record(s)", records.len());
        self.status = vec![PrintStatus::Pending; records.len()];
        self.records = records;
        self.labels = None;
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn status(&self, index: usize) -> Option<PrintStatus> {
        self.status.get(index).copied()
    }

    pub fn statuses(&self) -> &[PrintStatus] {
        &self.status
    }

    /// Set the status of the records at `indices`; unknown indices are ignored.
    pub fn mark(&mut self, indices: &[usize], status: PrintStatus) {
        for &i in indices {
            if let Some(s) = self.status.get_mut(i) {
                *s = status;
            }
        }
    }

    /// Keep freshly rendered labels, replacing any from an earlier run.
    pub fn hold_labels(&mut self, spec: LabelSpec, batch: LabelBatch) {
        self.labels = Some(HeldLabels { spec, batch });
    }

    pub fn labels(&self) -> Option<&HeldLabels> {
        self.labels.as_ref()
    }

    /// Drop held labels rendered at a different geometry.
    pub fn apply_label_spec(&mut self, spec: &LabelSpec) {
        if self.labels.as_ref().is_some_and(|held| held.spec != *spec) {
            info!("Label size changed, discarding rendered labels");
            self.labels = None;
        }
    }

    fn clear_records(&mut self) {
        self.records.clear();
        self.status.clear();
        self.labels = None;
    }
}
