//! Claim severity and claim occurrence models.
//!
//! This module provides:
//! - Feature preparation: one-hot encoding into an `ndarray` matrix and a
//!   seeded train/test split
//! - The [`Regressor`] and [`Classifier`] contracts and the fitted-model
//!   [`ModelRoster`]
//! - Linear, tree, forest and boosting models
//! - Evaluation metrics and the end-to-end [`ModelingRun`]

pub mod ensemble;
pub mod evaluation;
pub mod features;
pub mod linear;
pub mod split;
pub mod training;
pub mod tree;

pub use ensemble::{
    GradientBoostingClassifier, GradientBoostingRegressor, RandomForestClassifier,
    RandomForestRegressor,
};
pub use evaluation::{ClassReport, ClassificationMetrics, ClassificationReport, RegressionMetrics};
pub use features::{
    FeatureEncoder, FeatureMatrix, clean_and_impute, prepare_classification_data,
    prepare_severity_data,
};
pub use linear::{LinearRegression, LogisticRegression};
pub use split::{TrainTestSplit, train_test_split};
pub use training::{DatasetSummary, ModelingOutcome, ModelingReport, ModelingRun};
pub use tree::DecisionTree;

use crate::error::{Result, RiskError};
use ndarray::Array2;

/// A model predicting a continuous target.
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()>;

    /// Predictions for every row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>>;
}

/// A model predicting a binary target.
pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()>;

    /// Probability of the positive class for every row of `x`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// Class labels at the 0.5 probability threshold.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<bool>> {
        Ok(self.predict_proba(x)?.into_iter().map(|p| p >= 0.5).collect())
    }
}

/// Fitted models keyed by name, in training order.
pub struct ModelRoster<M: ?Sized> {
    models: Vec<(String, Box<M>)>,
}

impl<M: ?Sized> Default for ModelRoster<M> {
    fn default() -> Self {
        Self { models: Vec::new() }
    }
}

impl<M: ?Sized> ModelRoster<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fitted model. A model with the same name is replaced.
    pub fn insert(&mut self, name: impl Into<String>, model: Box<M>) {
        let name = name.into();
        match self.models.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = model,
            None => self.models.push((name, model)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&M> {
        self.models.iter().find(|(n, _)| n == name).map(|(_, m)| m.as_ref())
    }

    /// Look up a model that must have been trained.
    pub fn require(&self, name: &str) -> Result<&M> {
        self.get(name)
            .ok_or_else(|| RiskError::InvalidInput(format!("model '{name}' is not in the roster")))
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &M)> {
        self.models.iter().map(|(n, m)| (n.as_str(), m.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Reject empty or misaligned training data.
pub(crate) fn check_training_data(model: &str, x: &Array2<f64>, y_len: usize) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(RiskError::TrainingFailed {
            model: model.to_string(),
            reason: format!("empty feature matrix ({} x {})", x.nrows(), x.ncols()),
        });
    }
    if x.nrows() != y_len {
        return Err(RiskError::TrainingFailed {
            model: model.to_string(),
            reason: format!("{} feature rows but {} targets", x.nrows(), y_len),
        });
    }
    Ok(())
}

/// Reject prediction input whose width differs from the training data.
pub(crate) fn check_prediction_input(
    model: &str,
    x: &Array2<f64>,
    n_features: Option<usize>,
) -> Result<()> {
    match n_features {
        None => Err(RiskError::InvalidInput(format!("model '{model}' has not been fitted"))),
        Some(n) if n != x.ncols() => Err(RiskError::LengthMismatch {
            left: format!("{model} features"),
            left_len: n,
            right: "input columns".to_string(),
            right_len: x.ncols(),
        }),
        Some(_) => Ok(()),
    }
}
