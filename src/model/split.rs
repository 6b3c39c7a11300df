//! Deterministic train/holdout splits.

use rand::prelude::*;

/// Seeded shuffle split: returns `(train_idx, holdout_idx)`.
///
/// The holdout size is `round(n * holdout_fraction)`, clamped so both sides
/// stay non-empty whenever `n >= 2`.
pub fn holdout_split(n: usize, holdout_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let mut holdout_len = ((n as f64) * holdout_fraction).round() as usize;
    if n >= 2 {
        holdout_len = holdout_len.clamp(1, n - 1);
    } else {
        holdout_len = 0;
    }

    let (holdout, train) = idx.split_at(holdout_len);
    (train.to_vec(), holdout.to_vec())
}

/// Class-stratified split: each class contributes proportionally to the
/// holdout, so no class ends up absent from evaluation.
///
/// A class with fewer than two members stays entirely in training.
pub fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    holdout_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut holdout = Vec::new();

    for class in 0..n_classes {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        let n = members.len();
        let take = if n < 2 {
            0
        } else {
            (((n as f64) * holdout_fraction).round() as usize).clamp(1, n - 1)
        };

        holdout.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }

    (train, holdout)
}
