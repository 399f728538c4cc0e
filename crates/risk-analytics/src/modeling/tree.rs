//! CART regression trees.
//!
//! Splits minimize the summed squared error of the two children. The value
//! stored in each leaf is supplied by the caller, which lets gradient
//! boosting place Newton steps in the leaves while forests use the mean.

use crate::error::Result;
use crate::modeling::{Regressor, check_prediction_input, check_training_data};
use ndarray::{Array2, ArrayView1};
use rand::SeedableRng;
use rand::rngs::StdRng;

const TREE_MODEL: &str = "DecisionTree";

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A binary regression tree stored as a flat node arena.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    max_depth: usize,
    min_samples_split: usize,
    /// Features considered at each split; all when `None`.
    max_features: Option<usize>,
    seed: u64,
    nodes: Vec<Node>,
    n_features: Option<usize>,
}

impl DecisionTree {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            max_features: None,
            seed: 0,
            nodes: Vec::new(),
            n_features: None,
        }
    }

    /// Sample this many candidate features at every split.
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features.map(|k| k.max(1));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of nodes, leaves included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Grow the tree on the rows `indices` of `x`, splitting on `y` and
    /// setting each leaf to `leaf_value` of the rows it holds.
    ///
    /// `indices` may repeat rows (bootstrap samples).
    pub fn grow(
        &mut self,
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        rng: &mut StdRng,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> Result<()> {
        check_training_data(TREE_MODEL, x, y.len())?;
        self.nodes.clear();
        self.n_features = Some(x.ncols());
        self.build(x, y, indices, 0, rng, leaf_value);
        Ok(())
    }

    fn build(
        &mut self,
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        depth: usize,
        rng: &mut StdRng,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> usize {
        let node_id = self.nodes.len();

        let split = if depth < self.max_depth && indices.len() >= self.min_samples_split {
            self.best_split(x, y, indices, rng)
        } else {
            None
        };

        let Some((feature, threshold)) = split else {
            self.nodes.push(Node::Leaf(leaf_value(indices)));
            return node_id;
        };

        // reserve the slot, children are appended after it
        self.nodes.push(Node::Leaf(0.0));
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

        let left = self.build(x, y, &left_rows, depth + 1, rng, leaf_value);
        let right = self.build(x, y, &right_rows, depth + 1, rng, leaf_value);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    /// Feature and threshold with the lowest child squared error, if any
    /// split improves on the parent.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let n_features = x.ncols();
        let candidates: Vec<usize> = match self.max_features {
            Some(k) if k < n_features => rand::seq::index::sample(rng, n_features, k).into_vec(),
            _ => (0..n_features).collect(),
        };

        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n;
        if parent_sse <= 1e-12 {
            return None;
        }

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();

        for feature in candidates {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..order.len() - 1 {
                let target = y[order[k]];
                left_sum += target;
                left_sq += target * target;

                let current = x[[order[k], feature]];
                let next = x[[order[k + 1], feature]];
                if current == next {
                    continue;
                }

                let n_left = (k + 1) as f64;
                let n_right = n - n_left;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left)
                    + (right_sq - right_sum * right_sum / n_right);

                if best.is_none_or(|(_, _, b)| sse < b) {
                    best = Some((feature, current + (next - current) / 2.0, sse));
                }
            }
        }

        best.filter(|(_, _, sse)| *sse < parent_sse - 1e-12 * parent_sse)
            .map(|(feature, threshold, _)| (feature, threshold))
    }

    /// Leaf value reached by one row.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match self.nodes.get(node) {
                Some(Node::Leaf(value)) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Leaf values for every row of `x`.
    pub fn predict_rows(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_prediction_input(TREE_MODEL, x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }
}

/// Mean of `y` over the given rows.
pub(crate) fn mean_of(y: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

impl Regressor for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.grow(x, y, &indices, &mut rng, &|rows| mean_of(y, rows))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        self.predict_rows(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;
    use ndarray::array;

    #[test]
    fn test_tree_fits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [5.0, 5.0, 5.0, 50.0, 50.0, 50.0];

        let mut tree = DecisionTree::new(4, 2);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict(&x).unwrap(), y.to_vec());
        assert_eq!(tree.predict(&array![[6.0], [7.0]]).unwrap(), vec![5.0, 50.0]);
    }

    #[test]
    fn test_tree_respects_max_depth() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..16).map(|i| (i * i) as f64).collect();

        let mut stump = DecisionTree::new(1, 2);
        stump.fit(&x, &y).unwrap();
        assert_eq!(stump.node_count(), 3);

        let mut deep = DecisionTree::new(20, 2);
        deep.fit(&x, &y).unwrap();
        assert_eq!(deep.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_pure_node_is_a_leaf() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut tree = DecisionTree::new(5, 2);
        tree.fit(&x, &[7.0, 7.0]).unwrap();
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_custom_leaf_values() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0.0, 0.0, 1.0, 1.0];
        let indices = [0, 1, 2, 3];
        let mut rng = StdRng::seed_from_u64(1);

        let mut tree = DecisionTree::new(3, 2);
        tree.grow(&x, &y, &indices, &mut rng, &|rows| rows.len() as f64 * 10.0).unwrap();

        assert_eq!(tree.predict_rows(&x).unwrap(), vec![20.0, 20.0, 20.0, 20.0]);
    }

    #[test]
    fn test_feature_subsampling_still_splits() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = [0.0, 1.0, 2.0, 3.0];
        let mut tree = DecisionTree::new(5, 2).with_max_features(Some(1)).with_seed(3);
        tree.fit(&x, &y).unwrap();
        assert!(tree.node_count() > 1);
    }

    #[test]
    fn test_tree_errors() {
        let tree = DecisionTree::new(3, 2);
        assert!(tree.predict(&array![[1.0]]).is_err());

        let mut tree = DecisionTree::new(3, 2);
        assert!(matches!(
            tree.fit(&array![[1.0], [2.0]], &[1.0]).unwrap_err(),
            RiskError::TrainingFailed { .. }
        ));
    }
}
