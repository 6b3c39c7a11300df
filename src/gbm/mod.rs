//! Gradient-boosted tree ensembles: storage, training, and inference.
//!
//! A deliberately compact booster: exact greedy splits over a dense `f64`
//! matrix, depth-limited trees, Newton leaf weights, shrinkage learning rate.
//! Regression uses a squared-error objective; the tier classifier reuses the
//! same grower with a multiclass softmax objective (one tree per class per
//! round). Training is fully deterministic for a given input matrix.

mod forest;
mod trainer;

pub use forest::{Forest, Tree, TreeNode};
pub use trainer::{GbmParams, GbmTrainer};
