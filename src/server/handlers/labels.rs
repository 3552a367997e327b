//! Label rendering and printing handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use image::DynamicImage;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::error::LabelError;
use crate::output::{LabelBatch, PreviewOutput, RecordOutput};
use crate::printing;
use crate::render::export::encode_png;
use crate::session::PrintStatus;
use crate::transport::raster::PageResult;
use crate::transport::{PageOutcome, spooler};

use super::super::state::AppState;
use super::{ApiError, ApiResult, blocking};

/// POST /api/labels/generate - render the current records, return the grid.
pub async fn generate(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let records = {
        let session = state.session.read().await;
        session.require_user()?;
        session.records().to_vec()
    };
    if records.is_empty() {
        return Err(ApiError(LabelError::Config(
            "No students loaded, select a module first".to_string(),
        )));
    }

    let composer = state.composer().await?;
    let policy = state.settings.read().await.missing_barcode;
    let spec = *composer.spec();

    let (batch, png) = blocking(move || {
        let batch = PreviewOutput::new(composer, policy).produce(&records);
        let grid = batch
            .grid()
            .ok_or_else(|| LabelError::Image("no label could be rendered".to_string()))?;
        let png = encode_png(&grid, spec.dpi())?;
        Ok((batch, png))
    })
    .await?;

    let summary = format!(
        "{} rendered, {} skipped, {} failed",
        batch.labels.len(),
        batch.skipped().len(),
        batch.failed().len()
    );
    state.session.write().await.hold_labels(spec, batch);

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::HeaderName::from_static("x-label-summary"), summary),
        ],
        png,
    ))
}

/// GET /api/labels/preview/:value - one label as PNG.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path(value): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let composer = state.composer().await?;
    let png = blocking(move || {
        let label = composer.compose(&value)?;
        encode_png(&label.image, composer.spec().dpi())
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintMode {
    /// TSPL commands, barcode drawn by the printer
    #[default]
    Commands,
    /// Rendered label images, one page each
    Raster,
}

#[derive(Debug, Deserialize)]
pub struct PrintForm {
    #[serde(default)]
    pub mode: PrintMode,
}

/// POST /api/labels/print - print the current records.
pub async fn print(
    State(state): State<Arc<AppState>>,
    Json(form): Json<PrintForm>,
) -> ApiResult<Json<Value>> {
    let records = {
        let session = state.session.read().await;
        session.require_user()?;
        session.records().to_vec()
    };
    if records.is_empty() {
        return Err(ApiError(LabelError::Config(
            "No students loaded, select a module first".to_string(),
        )));
    }

    let settings = state.settings.read().await.clone();
    let job_name = {
        let session = state.session.read().await;
        format!("labels-{}", session.module().unwrap_or("batch"))
    };

    match form.mode {
        PrintMode::Commands => {
            let result =
                blocking(move || printing::print_commands(&records, &settings, &job_name)).await;
            let mut session = state.session.write().await;
            match result {
                Ok(script) => {
                    session.mark(&script.emitted, PrintStatus::Printed);
                    session.mark(&script.skipped, PrintStatus::Failed);
                    Ok(Json(json!({
                        "success": true,
                        "printed": script.emitted,
                        "skipped": script.skipped,
                    })))
                }
                Err(e) => {
                    let all: Vec<usize> = (0..session.records().len()).collect();
                    session.mark(&all, PrintStatus::Failed);
                    Err(e)
                }
            }
        }
        PrintMode::Raster => {
            let spec = settings.label_spec()?;
            let held = {
                let mut session = state.session.write().await;
                session.apply_label_spec(&spec);
                session.labels().map(|h| h.batch.clone())
            };
            let batch = match held {
                Some(batch) => batch,
                None => {
                    let composer = state.composer().await?;
                    let policy = settings.missing_barcode;
                    let render = records.clone();
                    let batch =
                        blocking(move || Ok(PreviewOutput::new(composer, policy).produce(&render)))
                            .await?;
                    state.session.write().await.hold_labels(spec, batch.clone());
                    batch
                }
            };

            let images = batch.dynamic_images();
            let report =
                blocking(move || printing::print_raster(&images, &settings, &job_name)).await;
            let mut session = state.session.write().await;
            match report {
                Ok(report) => {
                    let (printed, failed) = split_pages(&batch, &report.pages);
                    session.mark(&printed, PrintStatus::Printed);
                    session.mark(&failed, PrintStatus::Failed);
                    session.mark(&batch.skipped(), PrintStatus::Failed);
                    session.mark(&batch.failed(), PrintStatus::Failed);
                    info!("Raster job: {} printed, {} failed", printed.len(), failed.len());
                    Ok(Json(json!({
                        "success": true,
                        "printed": printed,
                        "failed": failed,
                        "skipped": batch.skipped(),
                        "pages": report.pages,
                    })))
                }
                Err(e) => {
                    let all: Vec<usize> = (0..session.records().len()).collect();
                    session.mark(&all, PrintStatus::Failed);
                    Err(e)
                }
            }
        }
    }
}

/// Record indices of printed and failed pages.
fn split_pages(
    batch: &LabelBatch,
    pages: &[PageResult],
) -> (Vec<usize>, Vec<usize>) {
    let mut printed = Vec::new();
    let mut failed = Vec::new();
    for page in pages {
        if let Some((record, _)) = batch.labels.get(page.index) {
            match page.outcome {
                PageOutcome::Printed { .. } => printed.push(*record),
                PageOutcome::Failed { .. } => failed.push(*record),
            }
        }
    }
    (printed, failed)
}

/// GET /api/printers
pub async fn printers(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let configured = state.settings.read().await.printer_name.clone();
    let (printers, default) =
        blocking(|| Ok((spooler::list_printers()?, spooler::default_printer()))).await?;
    let resolved = spooler::resolve_printer(&configured, &printers).ok();
    Ok(Json(json!({
        "printers": printers,
        "default": default,
        "configured": configured,
        "resolved": resolved,
    })))
}

/// POST /api/printers/test - print a test page on the configured printer.
pub async fn test_page(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    state.session.read().await.require_user()?;
    let settings = state.settings.read().await.clone();
    let font = state.font.read().await.clone();

    let report = blocking(move || {
        let page = spooler::test_page(&settings.printer_name, &font);
        printing::print_raster(&[DynamicImage::ImageRgb8(page)], &settings, "test-page")
    })
    .await?;

    Ok(Json(json!({"success": report.failed() == 0, "pages": report.pages})))
}
