//! Browse and scan handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::records::{RecordSource, ScanResult, Semester, StudentRecord};
use crate::session::PrintStatus;

use super::super::state::AppState;
use super::{ApiResult, blocking};

/// GET /api/semesters
pub async fn semesters(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Semester>>> {
    state.session.read().await.require_user()?;
    let store = state.records().await;
    Ok(Json(blocking(move || store.semesters()).await?))
}

/// GET /api/semesters/:semester/dates
pub async fn dates(
    State(state): State<Arc<AppState>>,
    Path(semester): Path<String>,
) -> ApiResult<Json<Vec<NaiveDate>>> {
    state.session.read().await.require_user()?;
    let store = state.records().await;
    let code = semester.clone();
    let dates = blocking(move || store.exam_dates(&code)).await?;
    state.session.write().await.select_semester(&semester);
    Ok(Json(dates))
}

#[derive(Debug, Deserialize)]
pub struct ModulesQuery {
    /// Restrict to modules examined on this date
    pub date: Option<NaiveDate>,
}

/// GET /api/semesters/:semester/modules?date=YYYY-MM-DD
pub async fn modules(
    State(state): State<Arc<AppState>>,
    Path(semester): Path<String>,
    Query(query): Query<ModulesQuery>,
) -> ApiResult<Json<Vec<String>>> {
    state.session.read().await.require_user()?;
    let store = state.records().await;
    let code = semester.clone();
    let modules = blocking(move || match query.date {
        Some(date) => store.modules_by_date(date, &code),
        None => store.modules_by_semester(&code),
    })
    .await?;

    let mut session = state.session.write().await;
    if session.semester() != Some(semester.as_str()) {
        session.select_semester(&semester);
    }
    if let Some(date) = query.date {
        session.select_date(date);
    }
    Ok(Json(modules))
}

#[derive(Debug, Deserialize)]
pub struct StudentsQuery {
    pub semester: String,
    pub module: String,
}

#[derive(Debug, Serialize)]
pub struct StudentRow {
    #[serde(flatten)]
    pub record: StudentRecord,
    pub status: PrintStatus,
    pub display: String,
}

/// GET /api/students?semester=..&module=..
///
/// Loads the module's records into the session as a new run.
pub async fn students(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StudentsQuery>,
) -> ApiResult<Json<Value>> {
    state.session.read().await.require_user()?;
    let store = state.records().await;
    let (module, semester) = (query.module.clone(), query.semester.clone());
    let (records, module_name) = blocking(move || {
        let records = store.students(&module, &semester)?;
        let name = store.module_name(&module)?;
        Ok((records, name))
    })
    .await?;

    let mut session = state.session.write().await;
    if session.semester() != Some(query.semester.as_str()) {
        session.select_semester(&query.semester);
    }
    session.select_module(&query.module);
    session.set_records(records);

    Ok(Json(json!({
        "module": query.module,
        "module_name": module_name,
        "students": rows(session.records(), session.statuses()),
    })))
}

/// GET /api/session/students - records of the current run with print status.
pub async fn current(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<StudentRow>>> {
    let session = state.session.read().await;
    session.require_user()?;
    Ok(Json(rows(session.records(), session.statuses())))
}

fn rows(records: &[StudentRecord], statuses: &[PrintStatus]) -> Vec<StudentRow> {
    records
        .iter()
        .zip(statuses)
        .map(|(record, status)| StudentRow {
            display: record.display_line(),
            record: record.clone(),
            status: *status,
        })
        .collect()
}

/// POST /api/records/test - check that the record source can be reached.
pub async fn test_connection(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    state.session.read().await.require_user()?;
    let store = state.records().await;
    blocking(move || store.test_connection()).await?;
    Ok(Json(json!({"success": true, "message": "Record source reachable"})))
}

/// GET /api/scan/:code - verify a scanned barcode or typed student ID.
pub async fn scan(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    state.session.read().await.require_user()?;
    let store = state.records().await;
    let code = code.trim().to_string();
    let lookup = code.clone();
    let found: Option<ScanResult> = blocking(move || store.lookup(&lookup)).await?;

    Ok(Json(match found {
        Some(result) => json!({"success": true, "verified": true, "result": result}),
        None => json!({
            "success": true,
            "verified": false,
            "message": format!("No record for '{}'", code),
        }),
    }))
}
