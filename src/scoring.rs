//! Batch scoring: apply the latest persisted regression model to bulk data.
//!
//! Segments here are a property of the *predicted-value* distribution of the
//! scored batch (top 10% → A, next 30% → B, rest → C). They are deliberately
//! a different concept from the tier classifier's actual-target-quantile
//! labels and the two are never unified.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::FeatureFrame;
use crate::error::{ArtifactKind, EngineError, Result};
use crate::outputs;
use crate::store::ArtifactStore;
use crate::utils::quantile;

/// A/B/C label from the scored batch's predicted-value quantiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictedSegment {
    A,
    B,
    C,
}

impl PredictedSegment {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictedSegment::A => "A",
            PredictedSegment::B => "B",
            PredictedSegment::C => "C",
        }
    }
}

impl std::fmt::Display for PredictedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub content_id: i64,
    pub influencer_id: i64,
    pub predicted_engagement_rate: f64,
    pub segment: PredictedSegment,
    pub model_version: String,
}

/// Per-segment row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCounts {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl SegmentCounts {
    pub fn total(&self) -> usize {
        self.a + self.b + self.c
    }
}

/// Outcome of one batch-scoring run.
#[derive(Debug, Clone)]
pub struct BatchScoreResult {
    pub output_path: PathBuf,
    pub model_version: String,
    pub segment_counts: SegmentCounts,
    pub predictions: Vec<BatchPrediction>,
}

/// Segment predictions by this batch's own distribution: values at or above
/// the 90th percentile → A, at or above the 60th → B, rest → C.
pub fn assign_segments(predictions: &[f64]) -> Vec<PredictedSegment> {
    if predictions.is_empty() {
        return Vec::new();
    }
    let mut sorted = predictions.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q90 = quantile(&sorted, 0.9);
    let q60 = quantile(&sorted, 0.6);

    predictions
        .iter()
        .map(|&p| {
            if p >= q90 {
                PredictedSegment::A
            } else if p >= q60 {
                PredictedSegment::B
            } else {
                PredictedSegment::C
            }
        })
        .collect()
}

/// Score a batch with the latest persisted regression bundle and write the
/// segmented predictions to `batch_predictions_{version}.csv`.
///
/// Requires a previously persisted model: a missing artifact is fatal for
/// the call, never a trigger to train here.
pub fn run_batch_scoring(
    store: &ArtifactStore,
    outputs_dir: &Path,
    frame: &FeatureFrame,
) -> Result<BatchScoreResult> {
    let bundle = store
        .load_latest_regression()?
        .ok_or(EngineError::ArtifactNotFound {
            kind: ArtifactKind::Regression,
        })?;

    if frame.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    frame.require_feature_columns()?;

    let values = bundle.predict_frame(frame);
    let segments = assign_segments(&values);

    let mut counts = SegmentCounts::default();
    let predictions: Vec<BatchPrediction> = frame
        .rows()
        .iter()
        .zip(values.iter().zip(&segments))
        .map(|(row, (&value, &segment))| {
            match segment {
                PredictedSegment::A => counts.a += 1,
                PredictedSegment::B => counts.b += 1,
                PredictedSegment::C => counts.c += 1,
            }
            BatchPrediction {
                content_id: row.content_id,
                influencer_id: row.influencer_id,
                predicted_engagement_rate: value,
                segment,
                model_version: bundle.version.clone(),
            }
        })
        .collect();

    let output_path = outputs::write_batch_predictions(outputs_dir, &bundle.version, &predictions)?;

    info!(
        n_rows = predictions.len(),
        segment_a = counts.a,
        segment_b = counts.b,
        segment_c = counts.c,
        version = %bundle.version,
        path = %output_path.display(),
        "batch scoring complete"
    );

    Ok(BatchScoreResult {
        output_path,
        model_version: bundle.version,
        segment_counts: counts,
        predictions,
    })
}
