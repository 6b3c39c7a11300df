//! Model bundles: a fitted pipeline plus forest, version, and feature order,
//! persisted together as one artifact.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::{FeatureFrame, FeatureRow};
use crate::gbm::Forest;
use crate::model::tier::HistoricalTier;
use crate::pipeline::FittedPipeline;

/// A trained engagement-rate regression artifact.
///
/// Immutable once persisted; the embedded pipeline guarantees predict-time
/// inputs receive the exact training-time transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub pipeline: FittedPipeline,
    pub forest: Forest,
    pub version: String,
    /// Raw input feature order (the contract, not the transformed layout).
    pub features: Vec<String>,
    /// Set by the artifact store after persistence.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl ModelBundle {
    /// Predict the engagement rate for one row.
    pub fn predict_row(&self, row: &FeatureRow) -> f64 {
        self.forest.predict(&self.pipeline.transform_row(row))
    }

    /// Predict engagement rates for every row of a frame.
    pub fn predict_frame(&self, frame: &FeatureFrame) -> Vec<f64> {
        frame.rows().iter().map(|r| self.predict_row(r)).collect()
    }
}

/// A trained A/B/C tier classification artifact.
///
/// Parallel to [`ModelBundle`] but persisted under a distinct namespace so
/// the two model types can never be cross-loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierModelBundle {
    pub pipeline: FittedPipeline,
    pub forest: Forest,
    pub version: String,
    pub features: Vec<String>,
    /// Output-group order of the forest.
    pub labels: Vec<HistoricalTier>,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl TierModelBundle {
    /// Predict the tier label for one row.
    pub fn predict_row(&self, row: &FeatureRow) -> HistoricalTier {
        let group = self.forest.predict_group(&self.pipeline.transform_row(row));
        self.labels[group]
    }

    /// Predict tier labels for every row of a frame.
    pub fn predict_frame(&self, frame: &FeatureFrame) -> Vec<HistoricalTier> {
        frame.rows().iter().map(|r| self.predict_row(r)).collect()
    }
}
