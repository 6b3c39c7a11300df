//! Influencer segmentation: per-influencer aggregation plus k-means.
//!
//! Cluster labels are an arbitrary permutation across independent runs;
//! callers must not treat label identity as stable, only the grouping.

use std::collections::{BTreeMap, HashMap};

use ndarray::{Array2, ArrayView2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CATEGORICAL_FEATURES, TARGET_COLUMN, UNKNOWN_CATEGORY};
use crate::data::FeatureFrame;
use crate::error::{EngineError, Result};
use crate::utils::{mean, std_dev};

/// One influencer's cluster membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub influencer_id: i64,
    pub cluster: usize,
    pub n_posts: usize,
}

// ============================================================================
// K-means
// ============================================================================

/// A fitted k-means model (Lloyd's algorithm, seeded init).
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    centroids: Array2<f64>,
}

impl KMeans {
    /// Fit `k` centroids and return `(assignments, model)`.
    ///
    /// Initialization picks `k` distinct input rows at random under the seed;
    /// iteration stops when assignments stabilize or after `max_iter` passes.
    /// An emptied cluster is re-seeded with the point farthest from its
    /// current centroid.
    pub fn fit(
        data: ArrayView2<'_, f64>,
        k: usize,
        seed: u64,
        max_iter: usize,
    ) -> (Vec<usize>, KMeans) {
        let n = data.nrows();
        let dims = data.ncols();
        debug_assert!(k >= 1 && k <= n);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);

        let mut centroids = Array2::zeros((k, dims));
        for (c, &row) in order.iter().take(k).enumerate() {
            for d in 0..dims {
                centroids[[c, d]] = data[[row, d]];
            }
        }

        let mut assignments = vec![0usize; n];
        for _iter in 0..max_iter {
            let mut changed = false;
            for i in 0..n {
                let nearest = nearest_centroid(&data, &centroids, i);
                if assignments[i] != nearest {
                    assignments[i] = nearest;
                    changed = true;
                }
            }

            // Recompute means; re-seed any emptied cluster.
            let mut sums = Array2::<f64>::zeros((k, dims));
            let mut counts = vec![0usize; k];
            for i in 0..n {
                counts[assignments[i]] += 1;
                for d in 0..dims {
                    sums[[assignments[i], d]] += data[[i, d]];
                }
            }
            for c in 0..k {
                if counts[c] == 0 {
                    let far = farthest_point(&data, &centroids, &assignments);
                    for d in 0..dims {
                        centroids[[c, d]] = data[[far, d]];
                    }
                    changed = true;
                } else {
                    for d in 0..dims {
                        centroids[[c, d]] = sums[[c, d]] / counts[c] as f64;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        (assignments, KMeans { centroids })
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn centroids(&self) -> ArrayView2<'_, f64> {
        self.centroids.view()
    }

    /// Nearest-centroid label for one point.
    pub fn predict(&self, point: &[f64]) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for c in 0..self.centroids.nrows() {
            let dist: f64 = (0..self.centroids.ncols())
                .map(|d| {
                    let diff = point[d] - self.centroids[[c, d]];
                    diff * diff
                })
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        best
    }
}

fn nearest_centroid(data: &ArrayView2<'_, f64>, centroids: &Array2<f64>, row: usize) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for c in 0..centroids.nrows() {
        let mut dist = 0.0;
        for d in 0..data.ncols() {
            let diff = data[[row, d]] - centroids[[c, d]];
            dist += diff * diff;
        }
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

fn farthest_point(
    data: &ArrayView2<'_, f64>,
    centroids: &Array2<f64>,
    assignments: &[usize],
) -> usize {
    let mut far = 0;
    let mut far_dist = -1.0;
    for i in 0..data.nrows() {
        let c = assignments[i];
        let mut dist = 0.0;
        for d in 0..data.ncols() {
            let diff = data[[i, d]] - centroids[[c, d]];
            dist += diff * diff;
        }
        if dist > far_dist {
            far_dist = dist;
            far = i;
        }
    }
    far
}

// ============================================================================
// Influencer aggregation + clustering
// ============================================================================

#[derive(Default)]
struct InfluencerAgg {
    follower: Vec<f64>,
    tag: Vec<f64>,
    caption: Vec<f64>,
    engagement: Vec<f64>,
    // One count map per categorical feature, contract order.
    categories: [HashMap<String, usize>; 3],
    n_posts: usize,
}

/// Aggregate rows per influencer and partition with k-means.
///
/// One vector per influencer: mean of each numeric feature and of the target,
/// post count, and the first mode of each categorical (missing → the Unknown
/// sentinel). Numerics are standardized; categorical aggregates one-hot
/// encode with an extra missing-indicator column per feature.
pub fn cluster_influencers(
    frame: &FeatureFrame,
    n_clusters: usize,
    seed: u64,
) -> Result<(Vec<ClusterAssignment>, KMeans)> {
    if frame.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    if n_clusters == 0 {
        return Err(EngineError::InvalidParameter {
            name: "n_clusters",
            reason: "must be at least 1".into(),
        });
    }
    frame.require_columns(&[
        "follower_count",
        "category",
        "audience_top_country",
        TARGET_COLUMN,
    ])?;

    // Group rows by influencer (BTreeMap keeps output order deterministic).
    let mut groups: BTreeMap<i64, InfluencerAgg> = BTreeMap::new();
    for row in frame.rows() {
        let agg = groups.entry(row.influencer_id).or_default();
        agg.n_posts += 1;
        if let Some(v) = row.follower_count {
            agg.follower.push(v);
        }
        if let Some(v) = row.tag_count {
            agg.tag.push(v);
        }
        if let Some(v) = row.caption_length {
            agg.caption.push(v);
        }
        if let Some(v) = row.engagement_rate {
            agg.engagement.push(v);
        }
        for (slot, name) in CATEGORICAL_FEATURES.iter().enumerate() {
            if let Some(value) = row.categorical(name) {
                *agg.categories[slot].entry(value.to_string()).or_default() += 1;
            }
        }
    }

    let ids: Vec<i64> = groups.keys().copied().collect();
    let n = ids.len();
    let k = n_clusters.min(n);

    // Per-influencer modes; ties break to the lexicographically smallest.
    let modes: Vec<[Option<String>; 3]> = groups
        .values()
        .map(|agg| {
            let mut out: [Option<String>; 3] = [None, None, None];
            for (slot, counts) in agg.categories.iter().enumerate() {
                out[slot] = first_mode(counts);
            }
            out
        })
        .collect();

    // Vocabulary per categorical feature, from observed modes.
    let mut vocabularies: [Vec<String>; 3] = Default::default();
    for (slot, vocab) in vocabularies.iter_mut().enumerate() {
        let mut values: Vec<String> = modes
            .iter()
            .filter_map(|m| m[slot].clone())
            .filter(|v| v != UNKNOWN_CATEGORY)
            .collect();
        values.sort();
        values.dedup();
        *vocab = values;
    }

    // Numeric block: means + post count, standardized column-wise.
    let numeric_rows: Vec<[f64; 5]> = groups
        .values()
        .map(|agg| {
            [
                mean(&agg.follower),
                mean(&agg.tag),
                mean(&agg.caption),
                mean(&agg.engagement),
                agg.n_posts as f64,
            ]
        })
        .collect();

    let one_hot_width: usize = vocabularies.iter().map(|v| v.len() + 1).sum();
    let width = 5 + one_hot_width;
    let mut matrix = Array2::zeros((n, width));

    for col in 0..5 {
        let column: Vec<f64> = numeric_rows.iter().map(|r| r[col]).collect();
        let m = mean(&column);
        let s = std_dev(&column);
        let s = if s > 0.0 { s } else { 1.0 };
        for (i, value) in column.iter().enumerate() {
            matrix[[i, col]] = (value - m) / s;
        }
    }

    for (i, mode) in modes.iter().enumerate() {
        let mut offset = 5;
        for (slot, vocab) in vocabularies.iter().enumerate() {
            match &mode[slot] {
                Some(value) if value != UNKNOWN_CATEGORY => {
                    if let Ok(pos) = vocab.binary_search(value) {
                        matrix[[i, offset + pos]] = 1.0;
                    }
                }
                // Missing indicator occupies the last column of the block.
                _ => matrix[[i, offset + vocab.len()]] = 1.0,
            }
            offset += vocab.len() + 1;
        }
    }

    let (labels, model) = KMeans::fit(matrix.view(), k, seed, 100);
    debug!(n_influencers = n, k, "influencers clustered");

    let assignments = ids
        .iter()
        .zip(&labels)
        .map(|(&influencer_id, &cluster)| ClusterAssignment {
            influencer_id,
            cluster,
            n_posts: groups[&influencer_id].n_posts,
        })
        .collect();

    Ok((assignments, model))
}

/// Most frequent value; ties break to the lexicographically smallest.
fn first_mode(counts: &HashMap<String, usize>) -> Option<String> {
    let mut entries: Vec<(&String, &usize)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    entries.first().map(|(value, _)| (*value).clone())
}
