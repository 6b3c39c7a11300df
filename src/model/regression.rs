//! Engagement-rate regression training and feature importances.

use tracing::info;

use crate::config::{new_model_version, FEATURE_COLUMNS};
use crate::data::FeatureFrame;
use crate::error::{EngineError, Result};
use crate::gbm::{GbmParams, GbmTrainer};
use crate::model::bundle::ModelBundle;
use crate::model::metrics::{mean_absolute_error, r2_score};
use crate::model::split::holdout_split;
use crate::pipeline::{FittedPipeline, PipelineParams};

/// Train the regression pipeline and return `(bundle, r2, mae)`.
///
/// A fixed-seed 80/20 holdout is carved out before fitting; both pipeline and
/// forest see only the training side, and metrics are computed only on the
/// holdout. The returned bundle has no persistence side effect; the caller
/// decides whether to save it.
pub fn train_model(frame: &FeatureFrame, seed: u64) -> Result<(ModelBundle, f64, f64)> {
    if frame.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    frame.require_target()?;

    let labeled = frame.labeled();
    labeled.require_feature_columns()?;

    let (train_idx, holdout_idx) = holdout_split(labeled.len(), 0.2, seed);
    let train = labeled.select(&train_idx);
    let holdout = labeled.select(&holdout_idx);

    let pipeline = FittedPipeline::fit(PipelineParams::default(), &train)?;
    let matrix = pipeline.transform(&train);
    let targets: Vec<f64> = train.labeled_rows().map(|(_, t)| t).collect();

    let trainer = GbmTrainer::new(GbmParams::default());
    let forest = trainer.fit_regression(matrix.view(), &targets);

    let bundle = ModelBundle {
        pipeline,
        forest,
        version: new_model_version("model"),
        features: FEATURE_COLUMNS.iter().map(|f| f.to_string()).collect(),
        path: None,
    };

    let holdout_targets: Vec<f64> = holdout.labeled_rows().map(|(_, t)| t).collect();
    let holdout_preds = bundle.predict_frame(&holdout);
    let r2 = r2_score(&holdout_targets, &holdout_preds);
    let mae = mean_absolute_error(&holdout_targets, &holdout_preds);

    info!(
        version = %bundle.version,
        n_train = train.len(),
        n_holdout = holdout.len(),
        r2,
        mae,
        "regression model trained"
    );

    Ok((bundle, r2, mae))
}

/// Gain-based importances aligned with transformed feature names, sorted
/// descending.
pub fn extract_feature_importances(bundle: &ModelBundle) -> Vec<(String, f64)> {
    let names = bundle.pipeline.feature_names();
    let mut pairs: Vec<(String, f64)> = names
        .into_iter()
        .zip(bundle.forest.feature_importance().iter().copied())
        .collect();
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    pairs
}
