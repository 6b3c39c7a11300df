//! Per-influencer skill scores from shrunken residuals.
//!
//! A raw mean residual over-rewards influencers with few posts: one lucky
//! post looks like skill. The shrinkage weight `n / (n + k)` pulls low-volume
//! estimates toward zero while high-volume influencers keep close to their
//! raw mean residual.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::FeatureFrame;
use crate::error::{EngineError, Result};
use crate::model::ModelBundle;

/// One influencer's skill estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillScoreRecord {
    pub influencer_id: i64,
    pub n_posts: usize,
    pub mean_residual: f64,
    pub shrinkage_weight: f64,
    pub skill_score: f64,
}

/// Estimate influencer skill from residuals against a trained regression
/// bundle; returns records sorted descending by skill score.
///
/// residual = actual − predicted, grouped per influencer;
/// skill = mean_residual × n / (n + shrinkage_k).
pub fn estimate_influencer_skill(
    frame: &FeatureFrame,
    bundle: &ModelBundle,
    shrinkage_k: f64,
) -> Result<Vec<SkillScoreRecord>> {
    if frame.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    frame.require_target()?;

    let mut groups: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for (row, actual) in frame.labeled_rows() {
        let residual = actual - bundle.predict_row(row);
        let entry = groups.entry(row.influencer_id).or_insert((0.0, 0));
        entry.0 += residual;
        entry.1 += 1;
    }

    let mut records: Vec<SkillScoreRecord> = groups
        .into_iter()
        .map(|(influencer_id, (residual_sum, n_posts))| {
            let mean_residual = residual_sum / n_posts as f64;
            let shrinkage_weight = n_posts as f64 / (n_posts as f64 + shrinkage_k);
            SkillScoreRecord {
                influencer_id,
                n_posts,
                mean_residual,
                shrinkage_weight,
                skill_score: mean_residual * shrinkage_weight,
            }
        })
        .collect();

    records.sort_by(|a, b| {
        b.skill_score
            .partial_cmp(&a.skill_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.influencer_id.cmp(&b.influencer_id))
    });

    Ok(records)
}
