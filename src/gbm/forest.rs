//! Tree and forest storage for inference.

use serde::{Deserialize, Serialize};

use crate::utils::argmax;

/// One node in a flat tree layout; children are indices into the node array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: u32,
    pub threshold: f64,
    pub left: u32,
    pub right: u32,
    /// Leaf weight (already scaled by the learning rate).
    pub value: f64,
    pub is_leaf: bool,
}

impl TreeNode {
    /// A leaf node with the given weight.
    pub fn leaf(value: f64) -> Self {
        Self {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
            is_leaf: true,
        }
    }
}

/// A single regression tree over transformed features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<TreeNode> {
        &mut self.nodes
    }

    /// Traverse from the root for one dense feature row.
    ///
    /// Split rule: `value <= threshold` goes left.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf {
                return node.value;
            }
            idx = if row[node.feature as usize] <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }
}

/// A trained ensemble plus the metadata needed at predict time.
///
/// Trees are stored round-major: tree `i` contributes to output group
/// `i % n_groups`, so regression (`n_groups == 1`) and multiclass share one
/// layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    trees: Vec<Tree>,
    n_groups: usize,
    n_features: usize,
    base_score: Vec<f64>,
    /// Normalized split-gain totals per transformed feature.
    feature_importance: Vec<f64>,
}

impl Forest {
    pub fn new(
        trees: Vec<Tree>,
        n_groups: usize,
        n_features: usize,
        base_score: Vec<f64>,
        feature_importance: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(base_score.len(), n_groups);
        debug_assert_eq!(feature_importance.len(), n_features);
        Self {
            trees,
            n_groups,
            n_features,
            base_score,
            feature_importance,
        }
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_groups(&self) -> usize {
        self.n_groups
    }

    pub fn num_features(&self) -> usize {
        self.n_features
    }

    /// Raw margin per output group for one row.
    pub fn predict_margins(&self, row: &[f64]) -> Vec<f64> {
        let mut margins = self.base_score.clone();
        for (i, tree) in self.trees.iter().enumerate() {
            margins[i % self.n_groups] += tree.predict_row(row);
        }
        margins
    }

    /// Scalar prediction for a single-output (regression) forest.
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.predict_margins(row)[0]
    }

    /// Class index with the highest margin (softmax is monotonic, so margins
    /// suffice for the argmax).
    pub fn predict_group(&self, row: &[f64]) -> usize {
        argmax(&self.predict_margins(row))
    }

    /// Normalized gain-based importances, aligned to transformed features.
    pub fn feature_importance(&self) -> &[f64] {
        &self.feature_importance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// feat0 <= threshold → left_val, else right_val
    fn stump(threshold: f64, left_val: f64, right_val: f64) -> Tree {
        Tree::new(vec![
            TreeNode {
                feature: 0,
                threshold,
                left: 1,
                right: 2,
                value: 0.0,
                is_leaf: false,
            },
            TreeNode::leaf(left_val),
            TreeNode::leaf(right_val),
        ])
    }

    #[test]
    fn tree_routes_on_threshold() {
        let tree = stump(0.5, 1.0, 2.0);
        assert_eq!(tree.predict_row(&[0.3]), 1.0);
        assert_eq!(tree.predict_row(&[0.5]), 1.0);
        assert_eq!(tree.predict_row(&[0.7]), 2.0);
    }

    #[test]
    fn regression_forest_sums_trees_over_base() {
        let forest = Forest::new(
            vec![stump(0.5, 1.0, 2.0), stump(0.5, 0.5, -0.5)],
            1,
            1,
            vec![10.0],
            vec![1.0],
        );
        assert_eq!(forest.predict(&[0.3]), 11.5);
        assert_eq!(forest.predict(&[0.9]), 11.5);
    }

    #[test]
    fn multiclass_forest_routes_trees_to_groups() {
        // Two groups: tree 0 → group 0, tree 1 → group 1.
        let forest = Forest::new(
            vec![stump(0.5, 5.0, -5.0), stump(0.5, -5.0, 5.0)],
            2,
            1,
            vec![0.0, 0.0],
            vec![1.0],
        );
        assert_eq!(forest.predict_group(&[0.2]), 0);
        assert_eq!(forest.predict_group(&[0.8]), 1);
    }
}
