//! Tree ensembles: bagged random forests and gradient boosting.

use crate::error::Result;
use crate::modeling::tree::{DecisionTree, mean_of};
use crate::modeling::{Classifier, Regressor, check_prediction_input, check_training_data};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn as_targets(y: &[bool]) -> Vec<f64> {
    y.iter().map(|&c| if c { 1.0 } else { 0.0 }).collect()
}

// =============================================================================
// Random forest
// =============================================================================

/// Trees grown on bootstrap samples, predictions averaged.
#[derive(Debug, Clone)]
struct Forest {
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
    trees: Vec<DecisionTree>,
    n_features: Option<usize>,
}

impl Forest {
    fn new(n_trees: usize, max_depth: usize, min_samples_split: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split,
            seed,
            trees: Vec::new(),
            n_features: None,
        }
    }

    fn fit(
        &mut self,
        model: &str,
        x: &Array2<f64>,
        y: &[f64],
        max_features: Option<usize>,
    ) -> Result<()> {
        check_training_data(model, x, y.len())?;

        let n = x.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_trees);

        for _ in 0..self.n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut tree = DecisionTree::new(self.max_depth, self.min_samples_split)
                .with_max_features(max_features);
            tree.grow(x, y, &sample, &mut rng, &|rows| mean_of(y, rows))?;
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = Some(x.ncols());
        debug!("{}: grew {} trees on {} rows", model, self.trees.len(), n);
        Ok(())
    }

    fn predict_mean(&self, model: &str, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_prediction_input(model, x, self.n_features)?;

        let mut sums = vec![0.0; x.nrows()];
        for tree in &self.trees {
            for (sum, value) in sums.iter_mut().zip(tree.predict_rows(x)?) {
                *sum += value;
            }
        }
        let count = self.trees.len().max(1) as f64;
        Ok(sums.into_iter().map(|s| s / count).collect())
    }
}

/// Random forest regressor. Every split considers all features.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    forest: Forest,
}

impl RandomForestRegressor {
    const NAME: &'static str = "RandomForestRegressor";

    pub fn new(n_trees: usize, max_depth: usize, min_samples_split: usize, seed: u64) -> Self {
        Self {
            forest: Forest::new(n_trees, max_depth, min_samples_split, seed),
        }
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        self.forest.fit(Self::NAME, x, y, None)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        self.forest.predict_mean(Self::NAME, x)
    }
}

/// Random forest classifier.
///
/// Trees are grown on the 0/1 targets with √p candidate features per split;
/// the claim probability is the mean of the leaf class frequencies.
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    forest: Forest,
}

impl RandomForestClassifier {
    const NAME: &'static str = "RandomForestClassifier";

    pub fn new(n_trees: usize, max_depth: usize, min_samples_split: usize, seed: u64) -> Self {
        Self {
            forest: Forest::new(n_trees, max_depth, min_samples_split, seed),
        }
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        let max_features = (x.ncols() as f64).sqrt().round().max(1.0) as usize;
        self.forest.fit(Self::NAME, x, &as_targets(y), Some(max_features))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(self
            .forest
            .predict_mean(Self::NAME, x)?
            .into_iter()
            .map(|p| p.clamp(0.0, 1.0))
            .collect())
    }
}

// =============================================================================
// Gradient boosting
// =============================================================================

#[derive(Debug, Clone)]
struct BoostingParams {
    rounds: usize,
    max_depth: usize,
    learning_rate: f64,
    min_samples_split: usize,
    seed: u64,
}

/// Sum of shrunken tree outputs on top of a constant base score.
#[derive(Debug, Clone)]
struct BoostedTrees {
    params: BoostingParams,
    base_score: f64,
    trees: Vec<DecisionTree>,
    n_features: Option<usize>,
}

impl BoostedTrees {
    fn new(params: BoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: None,
        }
    }

    /// Fit rounds of trees to the negative gradient returned by `gradient`.
    ///
    /// `gradient(scores)` yields the residuals and the leaf-value rule for
    /// the current raw scores.
    fn fit<G>(&mut self, x: &Array2<f64>, base_score: f64, mut gradient: G) -> Result<()>
    where
        G: FnMut(&[f64]) -> (Vec<f64>, Box<dyn Fn(&[usize]) -> f64>),
    {
        let n = x.nrows();
        let indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut scores = vec![base_score; n];
        let mut trees = Vec::with_capacity(self.params.rounds);

        for _ in 0..self.params.rounds {
            let (residuals, leaf_value) = gradient(&scores);
            let mut tree = DecisionTree::new(self.params.max_depth, self.params.min_samples_split);
            tree.grow(x, &residuals, &indices, &mut rng, leaf_value.as_ref())?;

            for (score, step) in scores.iter_mut().zip(tree.predict_rows(x)?) {
                *score += self.params.learning_rate * step;
            }
            trees.push(tree);
        }

        self.base_score = base_score;
        self.trees = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn raw_scores(&self, model: &str, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_prediction_input(model, x, self.n_features)?;

        let mut scores = vec![self.base_score; x.nrows()];
        for tree in &self.trees {
            for (score, step) in scores.iter_mut().zip(tree.predict_rows(x)?) {
                *score += self.params.learning_rate * step;
            }
        }
        Ok(scores)
    }
}

/// Gradient-boosted regression trees on squared loss.
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    boosted: BoostedTrees,
}

impl GradientBoostingRegressor {
    const NAME: &'static str = "GradientBoostingRegressor";

    pub fn new(
        rounds: usize,
        max_depth: usize,
        learning_rate: f64,
        min_samples_split: usize,
        seed: u64,
    ) -> Self {
        Self {
            boosted: BoostedTrees::new(BoostingParams {
                rounds,
                max_depth,
                learning_rate,
                min_samples_split,
                seed,
            }),
        }
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        check_training_data(Self::NAME, x, y.len())?;

        let base = y.iter().sum::<f64>() / y.len() as f64;
        self.boosted.fit(x, base, |scores| {
            let residuals: Vec<f64> = y.iter().zip(scores).map(|(t, s)| t - s).collect();
            let leaf_targets = residuals.clone();
            let leaf_value: Box<dyn Fn(&[usize]) -> f64> =
                Box::new(move |rows: &[usize]| mean_of(&leaf_targets, rows));
            (residuals, leaf_value)
        })?;

        debug!("{}: {} rounds, base score {:.4}", Self::NAME, self.boosted.trees.len(), base);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        self.boosted.raw_scores(Self::NAME, x)
    }
}

/// Gradient-boosted trees on log-loss. Leaves hold the Newton step
/// `Σ residual / Σ p(1 - p)` of the rows they contain.
#[derive(Debug, Clone)]
pub struct GradientBoostingClassifier {
    boosted: BoostedTrees,
}

impl GradientBoostingClassifier {
    const NAME: &'static str = "GradientBoostingClassifier";

    pub fn new(
        rounds: usize,
        max_depth: usize,
        learning_rate: f64,
        min_samples_split: usize,
        seed: u64,
    ) -> Self {
        Self {
            boosted: BoostedTrees::new(BoostingParams {
                rounds,
                max_depth,
                learning_rate,
                min_samples_split,
                seed,
            }),
        }
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        check_training_data(Self::NAME, x, y.len())?;

        let targets = as_targets(y);
        let prior = (targets.iter().sum::<f64>() / targets.len() as f64).clamp(1e-6, 1.0 - 1e-6);
        let base = (prior / (1.0 - prior)).ln();

        self.boosted.fit(x, base, |scores| {
            let probs: Vec<f64> = scores.iter().map(|s| sigmoid(*s)).collect();
            let residuals: Vec<f64> = targets.iter().zip(&probs).map(|(t, p)| t - p).collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();
            let leaf_residuals = residuals.clone();

            let leaf_value: Box<dyn Fn(&[usize]) -> f64> = Box::new(move |rows: &[usize]| {
                let gradient: f64 = rows.iter().map(|&i| leaf_residuals[i]).sum();
                let hessian: f64 = rows.iter().map(|&i| hessians[i]).sum();
                if hessian < 1e-12 { 0.0 } else { gradient / hessian }
            });
            (residuals, leaf_value)
        })?;

        debug!("{}: {} rounds, prior {:.4}", Self::NAME, self.boosted.trees.len(), prior);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(self
            .boosted
            .raw_scores(Self::NAME, x)?
            .into_iter()
            .map(sigmoid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn step_data() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            if j == 0 { i as f64 } else { (i % 3) as f64 }
        });
        let y = (0..40).map(|i| if i < 20 { 100.0 } else { 300.0 }).collect();
        (x, y)
    }

    fn labels(x: &Array2<f64>) -> Vec<bool> {
        x.column(0).iter().map(|v| *v >= 20.0).collect()
    }

    fn mse(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / a.len() as f64
    }

    #[test]
    fn test_random_forest_regressor_learns_step() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(20, 8, 2, 42);
        forest.fit(&x, &y).unwrap();

        let preds = forest.predict(&x).unwrap();
        assert!(preds[0] < 150.0);
        assert!(preds[39] > 250.0);
    }

    #[test]
    fn test_random_forest_is_seeded() {
        let (x, y) = step_data();
        let mut a = RandomForestRegressor::new(5, 4, 2, 7);
        let mut b = RandomForestRegressor::new(5, 4, 2, 7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_random_forest_classifier_probabilities() {
        let (x, _) = step_data();
        let y = labels(&x);
        let mut forest = RandomForestClassifier::new(25, 8, 2, 42);
        forest.fit(&x, &y).unwrap();

        let proba = forest.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] < 0.5);
        assert!(proba[39] > 0.5);
    }

    #[test]
    fn test_gradient_boosting_regressor_reduces_error() {
        let (x, y) = step_data();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let baseline = mse(&vec![mean; y.len()], &y);

        let mut model = GradientBoostingRegressor::new(20, 3, 0.3, 2, 42);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();

        assert!(mse(&preds, &y) < baseline * 0.01);
    }

    #[test]
    fn test_gradient_boosting_single_round_is_shrunk_tree() {
        let (x, y) = step_data();
        let mut model = GradientBoostingRegressor::new(1, 1, 0.5, 2, 42);
        model.fit(&x, &y).unwrap();

        // base 200, residual leaves -100 / +100 shrunk by half
        let preds = model.predict(&x).unwrap();
        assert_relative_eq!(preds[0], 150.0, epsilon = 1e-9);
        assert_relative_eq!(preds[39], 250.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, _) = step_data();
        let y = labels(&x);
        let mut model = GradientBoostingClassifier::new(10, 3, 0.3, 2, 42);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| *p > 0.0 && *p < 1.0));
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_unfitted_ensembles_reject_prediction() {
        let (x, _) = step_data();
        assert!(RandomForestRegressor::new(2, 2, 2, 0).predict(&x).is_err());
        assert!(GradientBoostingClassifier::new(2, 2, 0.3, 2, 0).predict_proba(&x).is_err());
    }
}
