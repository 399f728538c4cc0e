//! Linear models: least squares regression and L2 logistic regression.
//!
//! Both fit on standardized features. One-hot encoding keeps every level,
//! so the indicator columns of a category always sum to one; the small ridge
//! term keeps the normal equations solvable in that case.

use crate::error::{Result, RiskError};
use crate::modeling::{Classifier, Regressor, check_prediction_input, check_training_data};
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

const LINEAR_MODEL: &str = "LinearRegression";
const LOGISTIC_MODEL: &str = "LogisticRegression";

/// Per-column centering and scaling. Constant columns are mapped to zero.
#[derive(Debug, Clone)]
struct Standardizer {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl Standardizer {
    fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows() as f64;
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scales = Array1::from_iter(x.columns().into_iter().zip(means.iter()).map(|(col, &m)| {
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            var.sqrt()
        }));
        Self { means, scales }
    }

    fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut z = x.clone();
        for (j, mut col) in z.columns_mut().into_iter().enumerate() {
            let (m, s) = (self.means[j], self.scales[j]);
            if s > 0.0 {
                col.mapv_inplace(|v| (v - m) / s);
            } else {
                col.fill(0.0);
            }
        }
        z
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when the system is numerically singular.
pub(crate) fn solve_linear_system(mut a: Array2<f64>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

/// Ordinary least squares with an intercept.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    /// Ridge penalty per training row, applied on the standardized scale.
    ridge: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            ridge: 1e-6,
            coefficients: None,
            intercept: 0.0,
        }
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coefficients on the original feature scale, once fitted.
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        check_training_data(LINEAR_MODEL, x, y.len())?;

        let n = x.nrows() as f64;
        let scaler = Standardizer::fit(x);
        let z = scaler.transform(x);

        let y_mean = y.iter().sum::<f64>() / n;
        let centered = Array1::from_iter(y.iter().map(|v| v - y_mean));

        let mut gram = z.t().dot(&z);
        for j in 0..gram.nrows() {
            gram[[j, j]] += self.ridge * n;
        }
        let rhs = z.t().dot(&centered).to_vec();

        let weights = solve_linear_system(gram, rhs).ok_or_else(|| RiskError::TrainingFailed {
            model: LINEAR_MODEL.to_string(),
            reason: "normal equations are singular".to_string(),
        })?;

        let coefficients = Array1::from_iter(
            weights
                .iter()
                .zip(scaler.scales.iter())
                .map(|(w, s)| if *s > 0.0 { w / s } else { 0.0 }),
        );
        self.intercept = y_mean - coefficients.dot(&scaler.means);
        self.coefficients = Some(coefficients);

        debug!("{} fitted on {} rows, intercept {:.4}", LINEAR_MODEL, x.nrows(), self.intercept);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        check_prediction_input(LINEAR_MODEL, x, self.coefficients.as_ref().map(|c| c.len()))?;
        let Some(coefficients) = &self.coefficients else {
            return Ok(Vec::new());
        };
        Ok(x.dot(coefficients).mapv(|v| v + self.intercept).to_vec())
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Binary logistic regression with an L2 penalty, fitted by full-batch
/// gradient descent on standardized features.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    max_iter: usize,
    /// Inverse regularization strength.
    c: f64,
    scaler: Option<Standardizer>,
    weights: Array1<f64>,
    bias: f64,
}

impl LogisticRegression {
    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter,
            c: 1.0,
            scaler: None,
            weights: Array1::zeros(0),
            bias: 0.0,
        }
    }

    fn decision(&self, z: &Array2<f64>) -> Array1<f64> {
        z.dot(&self.weights).mapv(|v| v + self.bias)
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(500)
    }
}

/// Largest eigenvalue of `zᵀz / n` by power iteration.
fn largest_eigenvalue(z: &Array2<f64>) -> f64 {
    let n = z.nrows() as f64;
    let mut v = Array1::from_elem(z.ncols(), 1.0 / (z.ncols() as f64).sqrt());
    let mut lambda = 0.0;
    for _ in 0..50 {
        let w = z.t().dot(&z.dot(&v)) / n;
        let norm = w.dot(&w).sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        lambda = norm;
        v = w / norm;
    }
    lambda
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> Result<()> {
        check_training_data(LOGISTIC_MODEL, x, y.len())?;

        let n = x.nrows() as f64;
        let scaler = Standardizer::fit(x);
        let z = scaler.transform(x);
        let target = Array1::from_iter(y.iter().map(|&c| if c { 1.0 } else { 0.0 }));

        let penalty = 1.0 / (self.c * n);
        // step 1/L for the smoothness constant of the penalized log-loss
        let step = 1.0 / (0.25 * largest_eigenvalue(&z) + penalty + 0.25);

        self.weights = Array1::zeros(z.ncols());
        self.bias = 0.0;

        for _ in 0..self.max_iter {
            let residual = self.decision(&z).mapv(sigmoid) - &target;
            let grad_w = z.t().dot(&residual) / n + &self.weights * penalty;
            let grad_b = residual.sum() / n;

            self.weights.scaled_add(-step, &grad_w);
            self.bias -= step * grad_b;
        }

        self.scaler = Some(scaler);
        debug!("{} fitted on {} rows", LOGISTIC_MODEL, x.nrows());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let Some(scaler) = &self.scaler else {
            return Err(RiskError::InvalidInput(format!(
                "model '{LOGISTIC_MODEL}' has not been fitted"
            )));
        };
        check_prediction_input(LOGISTIC_MODEL, x, Some(self.weights.len()))?;
        Ok(self.decision(&scaler.transform(x)).mapv(sigmoid).to_vec())
    }
}
