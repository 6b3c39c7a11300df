//! Direct A/B/C tier classification from actual-target quantiles.
//!
//! Tier labels are a property of the *historical* target distribution: the
//! cutoffs are recomputed from each training batch, never fixed. This is a
//! distinct concept from the batch scorer's predicted-value segments and the
//! two must not be conflated.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{new_model_version, FEATURE_COLUMNS};
use crate::data::FeatureFrame;
use crate::error::{EngineError, Result};
use crate::gbm::{GbmParams, GbmTrainer};
use crate::model::bundle::TierModelBundle;
use crate::model::metrics::{accuracy, macro_f1};
use crate::model::split::stratified_split;
use crate::pipeline::{FittedPipeline, PipelineParams};
use crate::utils::quantile;

/// Ordinal tier from actual-target quantile thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoricalTier {
    A,
    B,
    C,
}

impl HistoricalTier {
    /// Class index used by the multiclass forest.
    pub fn index(self) -> usize {
        match self {
            HistoricalTier::A => 0,
            HistoricalTier::B => 1,
            HistoricalTier::C => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HistoricalTier::A => "A",
            HistoricalTier::B => "B",
            HistoricalTier::C => "C",
        }
    }
}

impl std::fmt::Display for HistoricalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class order shared by training and the persisted bundle.
pub const TIER_LABELS: [HistoricalTier; 3] =
    [HistoricalTier::A, HistoricalTier::B, HistoricalTier::C];

/// Label each target by the batch's own quantiles:
/// A := target ≥ P(high_q), B := P(mid_q) ≤ target < P(high_q), C otherwise.
pub fn assign_tiers(targets: &[f64], high_q: f64, mid_q: f64) -> Vec<HistoricalTier> {
    if targets.is_empty() {
        return Vec::new();
    }
    let mut sorted = targets.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q_high = quantile(&sorted, high_q);
    let q_mid = quantile(&sorted, mid_q);

    targets
        .iter()
        .map(|&t| {
            if t >= q_high {
                HistoricalTier::A
            } else if t >= q_mid {
                HistoricalTier::B
            } else {
                HistoricalTier::C
            }
        })
        .collect()
}

/// Train the A/B/C classifier and return `(bundle, accuracy, macro_f1)`.
///
/// Quantile labels are derived from the actual target, the split is
/// class-stratified so no tier is absent from the holdout, and the forest is
/// trained directly on features, fully decoupled from the regression model.
pub fn train_tier_classifier(
    frame: &FeatureFrame,
    seed: u64,
) -> Result<(TierModelBundle, f64, f64)> {
    if frame.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    frame.require_target()?;

    let labeled = frame.labeled();
    labeled.require_feature_columns()?;

    let targets: Vec<f64> = labeled.labeled_rows().map(|(_, t)| t).collect();
    let tiers = assign_tiers(&targets, 0.9, 0.6);
    let label_idx: Vec<usize> = tiers.iter().map(|t| t.index()).collect();

    let (train_idx, holdout_idx) =
        stratified_split(&label_idx, TIER_LABELS.len(), 0.2, seed);
    let train = labeled.select(&train_idx);
    let holdout = labeled.select(&holdout_idx);
    let train_labels: Vec<usize> = train_idx.iter().map(|&i| label_idx[i]).collect();
    let holdout_labels: Vec<usize> = holdout_idx.iter().map(|&i| label_idx[i]).collect();

    // Classifier variant scales numerics instead of clipping them.
    let pipeline = FittedPipeline::fit(PipelineParams::standardized(), &train)?;
    let matrix = pipeline.transform(&train);

    let trainer = GbmTrainer::new(GbmParams::default());
    let forest = trainer.fit_multiclass(matrix.view(), &train_labels, TIER_LABELS.len());

    let bundle = TierModelBundle {
        pipeline,
        forest,
        version: new_model_version("tier"),
        features: FEATURE_COLUMNS.iter().map(|f| f.to_string()).collect(),
        labels: TIER_LABELS.to_vec(),
        path: None,
    };

    let holdout_preds: Vec<usize> = bundle
        .predict_frame(&holdout)
        .into_iter()
        .map(|t| t.index())
        .collect();
    let acc = accuracy(&holdout_labels, &holdout_preds);
    let f1 = macro_f1(&holdout_labels, &holdout_preds, TIER_LABELS.len());

    info!(
        version = %bundle.version,
        n_train = train.len(),
        n_holdout = holdout.len(),
        accuracy = acc,
        macro_f1 = f1,
        "tier classifier trained"
    );

    Ok((bundle, acc, f1))
}
