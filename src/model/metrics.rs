//! Evaluation metrics for regression and classification.

/// Coefficient of determination: `1 - SS_res / SS_tot`.
///
/// Returns 0.0 when the targets are constant (no variance to explain).
pub fn r2_score(targets: &[f64], preds: &[f64]) -> f64 {
    debug_assert_eq!(targets.len(), preds.len());
    if targets.is_empty() {
        return 0.0;
    }
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean) * (t - mean)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = targets
        .iter()
        .zip(preds)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    1.0 - ss_res / ss_tot
}

/// Mean absolute error.
pub fn mean_absolute_error(targets: &[f64], preds: &[f64]) -> f64 {
    debug_assert_eq!(targets.len(), preds.len());
    if targets.is_empty() {
        return 0.0;
    }
    targets
        .iter()
        .zip(preds)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / targets.len() as f64
}

/// Fraction of exact label matches.
pub fn accuracy(targets: &[usize], preds: &[usize]) -> f64 {
    debug_assert_eq!(targets.len(), preds.len());
    if targets.is_empty() {
        return 0.0;
    }
    let correct = targets.iter().zip(preds).filter(|(t, p)| t == p).count();
    correct as f64 / targets.len() as f64
}

/// Macro-averaged F1 over `n_classes` label indices.
///
/// A class with no true or predicted members contributes an F1 of zero,
/// keeping the average honest on skewed holdouts.
pub fn macro_f1(targets: &[usize], preds: &[usize], n_classes: usize) -> f64 {
    debug_assert_eq!(targets.len(), preds.len());
    if targets.is_empty() || n_classes == 0 {
        return 0.0;
    }

    let mut f1_sum = 0.0;
    for class in 0..n_classes {
        let tp = targets
            .iter()
            .zip(preds)
            .filter(|(t, p)| **t == class && **p == class)
            .count() as f64;
        let fp = targets
            .iter()
            .zip(preds)
            .filter(|(t, p)| **t != class && **p == class)
            .count() as f64;
        let fn_ = targets
            .iter()
            .zip(preds)
            .filter(|(t, p)| **t == class && **p != class)
            .count() as f64;

        let denom = 2.0 * tp + fp + fn_;
        if denom > 0.0 {
            f1_sum += 2.0 * tp / denom;
        }
    }
    f1_sum / n_classes as f64
}
