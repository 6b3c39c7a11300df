//! Centralized configuration: the feature contract, training defaults, and
//! artifact locations.
//!
//! Every component reads feature names from here so that training, scoring,
//! and insights stay aligned on one column contract.

use std::path::PathBuf;

use chrono::Utc;

// ============================================================================
// Feature contract
// ============================================================================

/// Numeric input features, in pipeline order.
pub const NUMERIC_FEATURES: [&str; 3] = ["follower_count", "tag_count", "caption_length"];

/// Categorical input features, in pipeline order.
pub const CATEGORICAL_FEATURES: [&str; 3] = ["content_type", "category", "audience_top_country"];

/// All input features, categorical first to match the transformed layout.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "content_type",
    "category",
    "audience_top_country",
    "follower_count",
    "tag_count",
    "caption_length",
];

/// Target column name.
pub const TARGET_COLUMN: &str = "engagement_rate";

/// Sentinel for categorical values that are absent at aggregation time.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

// ============================================================================
// Training defaults
// ============================================================================

/// Below this many real rows, training substitutes synthetic data.
pub const MIN_TRAINING_ROWS: usize = 40;

/// Number of synthetic rows generated for the cold-start fallback.
pub const SYNTHETIC_TRAINING_ROWS: usize = 400;

/// Fixed seed for holdout shuffles, k-means init, and synthetic generators.
pub const RANDOM_STATE: u64 = 42;

// ============================================================================
// Engine configuration
// ============================================================================

/// Runtime configuration for the insight engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding versioned model bundles.
    pub models_dir: PathBuf,

    /// Directory holding CSV side outputs.
    pub outputs_dir: PathBuf,

    /// Minimum real rows before the synthetic fallback triggers.
    pub min_training_rows: usize,

    /// Synthetic rows generated when the fallback triggers.
    pub synthetic_rows: usize,

    /// Seed for all deterministic randomness.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            outputs_dir: PathBuf::from("outputs"),
            min_training_rows: MIN_TRAINING_ROWS,
            synthetic_rows: SYNTHETIC_TRAINING_ROWS,
            seed: RANDOM_STATE,
        }
    }
}

// ============================================================================
// Version strings
// ============================================================================

/// Generate a version string for model artifacts: `{prefix}-{UTCYYYYMMDDHHMMSS}`.
///
/// Timestamps have second granularity; the artifact store disambiguates
/// same-second collisions when persisting.
pub fn new_model_version(prefix: &str) -> String {
    format!("{prefix}-{}", Utc::now().format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_carries_prefix_and_timestamp() {
        let v = new_model_version("model");
        assert!(v.starts_with("model-"));
        // prefix + dash + 14 timestamp digits
        assert_eq!(v.len(), "model-".len() + 14);
        assert!(v["model-".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn feature_columns_cover_both_branches() {
        for f in NUMERIC_FEATURES {
            assert!(FEATURE_COLUMNS.contains(&f));
        }
        for f in CATEGORICAL_FEATURES {
            assert!(FEATURE_COLUMNS.contains(&f));
        }
        assert_eq!(
            FEATURE_COLUMNS.len(),
            NUMERIC_FEATURES.len() + CATEGORICAL_FEATURES.len()
        );
    }
}
