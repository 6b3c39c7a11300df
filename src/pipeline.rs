//! Preprocessing pipeline: imputation, outlier handling, one-hot encoding.
//!
//! The pipeline has two column-disjoint branches whose outputs are
//! concatenated, categorical block first:
//!
//! - categorical: most-frequent imputation + one-hot encoding that tolerates
//!   unseen categories (they encode to an all-zero block, never an error);
//! - numeric: median imputation + either quantile clipping (regression) or
//!   standardization (tier classifier).
//!
//! Clipping is a custom step rather than a plain scaler: follower counts span
//! orders of magnitude, and the learned 1st/99th-percentile bounds are applied
//! identically at transform time. A fitted pipeline is embedded inside every
//! saved model bundle so predict-time inputs always pass through the exact
//! training-time transform.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use crate::data::{FeatureFrame, FeatureRow};
use crate::error::{EngineError, Result};
use crate::utils::{mean, median, quantile, std_dev};

// ============================================================================
// Parameters
// ============================================================================

/// How the numeric branch treats values after median imputation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumericMode {
    /// Clip to quantile bounds learned at fit time.
    ClipQuantiles { lower: f64, upper: f64 },
    /// Standardize to zero mean / unit variance.
    Standardize,
}

/// Pipeline construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub numeric_mode: NumericMode,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            numeric_mode: NumericMode::ClipQuantiles {
                lower: 0.01,
                upper: 0.99,
            },
        }
    }
}

impl PipelineParams {
    /// Numeric branch standardizes instead of clipping (classifier variant).
    pub fn standardized() -> Self {
        Self {
            numeric_mode: NumericMode::Standardize,
        }
    }
}

// ============================================================================
// Fitted state
// ============================================================================

/// Fitted per-categorical-feature state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedCategorical {
    name: String,
    /// Imputation value for missing entries (ties broken lexicographically).
    most_frequent: String,
    /// Known categories, sorted; defines the one-hot block layout.
    vocabulary: Vec<String>,
}

/// Post-imputation numeric treatment learned at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum NumericStats {
    Clip { lower: f64, upper: f64 },
    Scale { mean: f64, std: f64 },
}

/// Fitted per-numeric-feature state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedNumeric {
    name: String,
    median: f64,
    stats: NumericStats,
}

/// A fitted preprocessing pipeline; transform-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    params: PipelineParams,
    categorical: Vec<FittedCategorical>,
    numeric: Vec<FittedNumeric>,
}

impl FittedPipeline {
    /// Learn imputation values, vocabularies, and numeric bounds from a frame.
    ///
    /// Errors on empty input or when a required feature column is entirely
    /// absent; offending column names are surfaced together.
    pub fn fit(params: PipelineParams, frame: &FeatureFrame) -> Result<Self> {
        if frame.is_empty() {
            return Err(EngineError::EmptyDataset);
        }
        frame.require_feature_columns()?;

        let categorical = CATEGORICAL_FEATURES
            .iter()
            .map(|name| fit_categorical(name, frame))
            .collect();

        let numeric = NUMERIC_FEATURES
            .iter()
            .map(|name| fit_numeric(name, frame, params.numeric_mode))
            .collect();

        Ok(Self {
            params,
            categorical,
            numeric,
        })
    }

    /// Width of the transformed feature space.
    pub fn output_width(&self) -> usize {
        let one_hot: usize = self.categorical.iter().map(|c| c.vocabulary.len()).sum();
        one_hot + self.numeric.len()
    }

    /// Transformed feature names: `feature=category` per one-hot column, then
    /// the numeric names. Aligns with feature-importance vectors.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.output_width());
        for cat in &self.categorical {
            for value in &cat.vocabulary {
                names.push(format!("{}={}", cat.name, value));
            }
        }
        for num in &self.numeric {
            names.push(num.name.clone());
        }
        names
    }

    /// Transform one row into the dense feature layout.
    ///
    /// Missing categoricals impute to the most frequent training value;
    /// unseen categories encode as an all-zero block. Missing numerics impute
    /// to the training median, then clip or scale per the fitted mode.
    pub fn transform_row(&self, row: &FeatureRow) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_width());

        for cat in &self.categorical {
            let value = row.categorical(&cat.name).unwrap_or(&cat.most_frequent);
            let hit = cat.vocabulary.binary_search_by(|v| v.as_str().cmp(value)).ok();
            for idx in 0..cat.vocabulary.len() {
                out.push(if Some(idx) == hit { 1.0 } else { 0.0 });
            }
        }

        for num in &self.numeric {
            let raw = row.numeric(&num.name).unwrap_or(num.median);
            let value = match num.stats {
                NumericStats::Clip { lower, upper } => raw.clamp(lower, upper),
                NumericStats::Scale { mean, std } => (raw - mean) / std,
            };
            out.push(value);
        }

        out
    }

    /// Transform a frame into an `n_rows x output_width` matrix.
    pub fn transform(&self, frame: &FeatureFrame) -> Array2<f64> {
        let width = self.output_width();
        let mut matrix = Array2::zeros((frame.len(), width));
        for (i, row) in frame.rows().iter().enumerate() {
            for (j, value) in self.transform_row(row).into_iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        matrix
    }
}

fn fit_categorical(name: &str, frame: &FeatureFrame) -> FittedCategorical {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in frame.rows() {
        if let Some(value) = row.categorical(name) {
            *counts.entry(value).or_default() += 1;
        }
    }

    let mut vocabulary: Vec<String> = counts.keys().map(|v| v.to_string()).collect();
    vocabulary.sort();

    // Highest count wins; ties resolve to the lexicographically smallest.
    let most_frequent = vocabulary
        .iter()
        .max_by(|a, b| {
            let ca = counts.get(a.as_str()).copied().unwrap_or(0);
            let cb = counts.get(b.as_str()).copied().unwrap_or(0);
            ca.cmp(&cb).then_with(|| b.cmp(a))
        })
        .cloned()
        .unwrap_or_default();

    FittedCategorical {
        name: name.to_string(),
        most_frequent,
        vocabulary,
    }
}

fn fit_numeric(name: &str, frame: &FeatureFrame, mode: NumericMode) -> FittedNumeric {
    let values: Vec<f64> = frame.rows().iter().filter_map(|r| r.numeric(name)).collect();
    let med = median(&values);

    let stats = match mode {
        NumericMode::ClipQuantiles { lower, upper } => {
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            NumericStats::Clip {
                lower: quantile(&sorted, lower),
                upper: quantile(&sorted, upper),
            }
        }
        NumericMode::Standardize => {
            let std = std_dev(&values);
            NumericStats::Scale {
                mean: mean(&values),
                std: if std > 0.0 { std } else { 1.0 },
            }
        }
    };

    FittedNumeric {
        name: name.to_string(),
        median: med,
        stats,
    }
}
