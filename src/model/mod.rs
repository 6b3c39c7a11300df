//! Model lifecycle: evaluation metrics, holdout splits, bundles, and the
//! regression / tier trainers.

pub mod bundle;
pub mod metrics;
pub mod regression;
pub mod split;
pub mod tier;

pub use bundle::{ModelBundle, TierModelBundle};
pub use regression::{extract_feature_importances, train_model};
pub use tier::{assign_tiers, train_tier_classifier, HistoricalTier, TIER_LABELS};
