//! # Record Outputs
//!
//! Two independent ways to turn student records into something printable:
//!
//! | Output | Produces | Barcode drawn by |
//! |--------|----------|------------------|
//! | [`PreviewOutput`] | RGB label images + grid preview | this crate |
//! | [`CommandOutput`] | TSPL command script | printer firmware |
//!
//! Both apply the same [`MissingBarcodePolicy`]. Batches never stop at a bad
//! record: every record gets an outcome by index.

use image::{DynamicImage, RgbImage};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MissingBarcodePolicy;
use crate::error::LabelError;
use crate::protocol::tspl::{self, MediaSize, Script};
use crate::records::StudentRecord;
use crate::render::{LabelComposer, RenderedLabel, compose_grid};

/// Produce output for a batch of records.
pub trait RecordOutput {
    type Output;

    fn produce(&self, records: &[StudentRecord]) -> Self::Output;
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Rendered,
    /// No barcode value under the active policy
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub index: usize,
    pub outcome: Outcome,
}

/// Rendered labels of a batch, in record order.
#[derive(Debug, Clone, Default)]
pub struct LabelBatch {
    /// Record index and its label
    pub labels: Vec<(usize, RenderedLabel)>,
    pub outcomes: Vec<RecordOutcome>,
}

impl LabelBatch {
    pub fn images(&self) -> Vec<RgbImage> {
        self.labels.iter().map(|(_, l)| l.image.clone()).collect()
    }

    pub fn dynamic_images(&self) -> Vec<DynamicImage> {
        self.labels
            .iter()
            .map(|(_, l)| DynamicImage::ImageRgb8(l.image.clone()))
            .collect()
    }

    /// Grid preview of all labels, `None` for an empty batch.
    pub fn grid(&self) -> Option<RgbImage> {
        compose_grid(&self.images())
    }

    pub fn skipped(&self) -> Vec<usize> {
        self.indices(|o| matches!(o, Outcome::Skipped))
    }

    pub fn failed(&self) -> Vec<usize> {
        self.indices(|o| matches!(o, Outcome::Failed { .. }))
    }

    /// Per-record failures as errors, for reporting.
    pub fn errors(&self) -> Vec<LabelError> {
        self.outcomes
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Failed { reason } => Some(LabelError::PartialRender {
                    index: r.index,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn indices(&self, pred: impl Fn(&Outcome) -> bool) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|r| pred(&r.outcome))
            .map(|r| r.index)
            .collect()
    }
}

/// Software-rendered label images.
pub struct PreviewOutput {
    composer: LabelComposer,
    policy: MissingBarcodePolicy,
}

impl PreviewOutput {
    pub fn new(composer: LabelComposer, policy: MissingBarcodePolicy) -> Self {
        Self { composer, policy }
    }

    pub fn composer(&self) -> &LabelComposer {
        &self.composer
    }
}

impl RecordOutput for PreviewOutput {
    type Output = LabelBatch;

    fn produce(&self, records: &[StudentRecord]) -> LabelBatch {
        let results: Vec<(usize, Result<Option<RenderedLabel>, LabelError>)> = records
            .par_iter()
            .enumerate()
            .map(|(index, record)| {
                let rendered = match self.policy.value_for(record) {
                    Some(value) => self.composer.compose(value).map(Some),
                    None => Ok(None),
                };
                (index, rendered)
            })
            .collect();

        let mut batch = LabelBatch::default();
        for (index, result) in results {
            let outcome = match result {
                Ok(Some(label)) => {
                    batch.labels.push((index, label));
                    Outcome::Rendered
                }
                Ok(None) => {
                    warn!(
                        "Record {} ({}) has no barcode, skipped",
                        index, records[index].student_id
                    );
                    Outcome::Skipped
                }
                Err(e) => {
                    warn!("Record {} failed: {}", index, e);
                    Outcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            batch.outcomes.push(RecordOutcome { index, outcome });
        }

        info!(
            "Rendered {} of {} labels ({} skipped, {} failed)",
            batch.labels.len(),
            records.len(),
            batch.skipped().len(),
            batch.failed().len()
        );
        batch
    }
}

/// Printer command script.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    media: MediaSize,
    policy: MissingBarcodePolicy,
}

impl CommandOutput {
    pub fn new(media: MediaSize, policy: MissingBarcodePolicy) -> Self {
        Self { media, policy }
    }
}

impl RecordOutput for CommandOutput {
    type Output = Script;

    fn produce(&self, records: &[StudentRecord]) -> Script {
        let script = tspl::emit(records, &self.media, self.policy);
        if !script.skipped.is_empty() {
            warn!(
                "{} record(s) without barcode left out of the command script",
                script.skipped.len()
            );
        }
        info!(
            "Command script: {} label(s), {} lines",
            script.emitted.len(),
            script.lines.len()
        );
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::LabelSpec;
    use crate::render::CaptionFont;
    use pretty_assertions::assert_eq;

    fn record(barcode: Option<&str>, id: &str) -> StudentRecord {
        StudentRecord {
            student_id: id.to_string(),
            barcode: barcode.map(str::to_string),
            venue_name: "Hall A".to_string(),
            ..Default::default()
        }
    }

    fn preview(policy: MissingBarcodePolicy) -> PreviewOutput {
        let spec = LabelSpec::new(60.0, 40.0, 203).unwrap();
        PreviewOutput::new(LabelComposer::new(spec, CaptionFont::builtin()), policy)
    }

    #[test]
    fn test_preview_keeps_order_and_reports_each_record() {
        let records = vec![
            record(Some("A1"), "1"),
            record(None, "2"),
            record(Some("bad\u{e9}"), "3"),
            record(Some("A4"), "4"),
        ];
        let batch = preview(MissingBarcodePolicy::Skip).produce(&records);

        let indices: Vec<usize> = batch.labels.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 3]);
        assert_eq!(batch.outcomes.len(), 4);
        assert_eq!(batch.skipped(), vec![1]);
        assert_eq!(batch.failed(), vec![2]);
        assert!(matches!(
            batch.errors()[0],
            LabelError::PartialRender { index: 2, .. }
        ));
    }

    #[test]
    fn test_preview_fallback_policy() {
        let batch = preview(MissingBarcodePolicy::StudentIdFallback)
            .produce(&[record(None, "2024001")]);
        assert_eq!(batch.labels.len(), 1);
        assert_eq!(batch.labels[0].1.value, "2024001");
    }

    #[test]
    fn test_preview_grid() {
        let batch = preview(MissingBarcodePolicy::Skip)
            .produce(&[record(Some("A1"), "1"), record(Some("A2"), "2")]);
        let grid = batch.grid().unwrap();
        assert_eq!(grid.dimensions(), (4 * 480 + 50, 320 + 20));
        assert!(LabelBatch::default().grid().is_none());
    }

    #[test]
    fn test_both_outputs_skip_the_same_records() {
        let records = vec![record(Some("A1"), "1"), record(Some("  "), "2")];
        let batch = preview(MissingBarcodePolicy::Skip).produce(&records);
        let script =
            CommandOutput::new(MediaSize::default(), MissingBarcodePolicy::Skip).produce(&records);
        assert_eq!(batch.skipped(), script.skipped);
    }
}
