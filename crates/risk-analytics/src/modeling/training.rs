//! End-to-end modeling run: preprocessing, training, evaluation and pricing.

use crate::config::{ConfigValidationError, ModelingConfig};
use crate::error::{Result, ResultExt};
use crate::modeling::ensemble::{
    GradientBoostingClassifier, GradientBoostingRegressor, RandomForestClassifier,
    RandomForestRegressor,
};
use crate::modeling::evaluation::{ClassificationMetrics, RegressionMetrics};
use crate::modeling::features::{
    clean_and_impute, prepare_classification_data, prepare_severity_data,
};
use crate::modeling::linear::{LinearRegression, LogisticRegression};
use crate::modeling::split::{TrainTestSplit, train_test_split};
use crate::modeling::{Classifier, ModelRoster, Regressor};
use crate::optimization::{PremiumSummary, compute_optimized_premium};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const LINEAR_REGRESSION: &str = "LinearRegression";
pub const LOGISTIC_REGRESSION: &str = "LogisticRegression";
pub const RANDOM_FOREST: &str = "RandomForest";
pub const GRADIENT_BOOSTING: &str = "GradientBoosting";

/// Classifier whose probabilities feed the premium.
pub const PRICING_CLASSIFIER: &str = GRADIENT_BOOSTING;
/// Regressor whose severity predictions feed the premium.
pub const PRICING_REGRESSOR: &str = RANDOM_FOREST;

/// Row and feature counts of one modeling dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub features: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl DatasetSummary {
    fn of<T>(split: &TrainTestSplit<T>) -> Self {
        Self {
            rows: split.y_train.len() + split.y_test.len(),
            features: split.x_train.n_features(),
            train_rows: split.y_train.len(),
            test_rows: split.y_test.len(),
        }
    }
}

/// Everything a modeling run measured, serialized as `model_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelingReport {
    pub generated_at: String,
    pub duration_ms: u64,
    pub test_size: f64,
    pub seed: u64,

    /// Policies with a claim, target `TotalClaims`.
    pub severity_data: DatasetSummary,
    /// All policies, target `HasClaim`.
    pub classification_data: DatasetSummary,

    pub regression_metrics: BTreeMap<String, RegressionMetrics>,
    pub classification_metrics: BTreeMap<String, ClassificationMetrics>,

    /// Test rows shared by both models when pricing.
    pub aligned_rows: usize,
    pub claim_probability_model: String,
    pub severity_model: String,
    pub premium_summary: Option<PremiumSummary>,

    pub processing_steps: Vec<String>,
}

/// Report plus the per-policy premiums it summarizes.
#[derive(Debug, Clone)]
pub struct ModelingOutcome {
    pub report: ModelingReport,
    pub premiums: Vec<f64>,
}

/// Trains the severity and claim-occurrence rosters on a cleaned table and
/// prices the held-out policies.
///
/// # Example
///
/// ```rust,ignore
/// let run = ModelingRun::new(ModelingConfig::default())?;
/// let outcome = run.execute(&cleaned)?;
/// println!("{:?}", outcome.report.premium_summary);
/// ```
pub struct ModelingRun {
    config: ModelingConfig,
}

impl ModelingRun {
    pub fn new(config: ModelingConfig) -> std::result::Result<Self, ConfigValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModelingConfig {
        &self.config
    }

    /// Run every modeling step on a copy of `df`.
    pub fn execute(&self, df: &DataFrame) -> Result<ModelingOutcome> {
        let start = Instant::now();
        let config = &self.config;
        let mut steps = Vec::new();

        info!("Step 1: Pre-model imputation");
        let mut data = df.clone();
        steps.extend(clean_and_impute(&mut data).context("Pre-model imputation")?);

        info!("Step 2: Preparing severity and classification data");
        let (x_sev, y_sev) = prepare_severity_data(&data, &config.high_cardinality_columns)
            .context("Severity data")?;
        let (x_cls, y_cls) = prepare_classification_data(&data, &config.high_cardinality_columns)
            .context("Classification data")?;

        let severity = train_test_split(&x_sev, &y_sev, config.test_size, config.seed)
            .context("Severity split")?;
        let classification = train_test_split(&x_cls, &y_cls, config.test_size, config.seed)
            .context("Classification split")?;
        steps.push(format!(
            "Split {} severity rows and {} classification rows (test size {})",
            y_sev.len(),
            y_cls.len(),
            config.test_size
        ));

        info!("Step 3: Training models");
        let regressors = self.train_regressors(&severity)?;
        let classifiers = self.train_classifiers(&classification)?;
        steps.push(format!("Trained regressors: {}", regressors.names().join(", ")));
        steps.push(format!("Trained classifiers: {}", classifiers.names().join(", ")));

        info!("Step 4: Evaluating models");
        let mut regression_metrics = BTreeMap::new();
        for (name, model) in regressors.iter() {
            let predictions = model.predict(&severity.x_test.values).context(name)?;
            let metrics = RegressionMetrics::compute(&severity.y_test, &predictions)?;
            info!("{} -> RMSE: {:.3}, R2: {:.3}", name, metrics.rmse, metrics.r2);
            regression_metrics.insert(name.to_string(), metrics);
        }

        let mut classification_metrics = BTreeMap::new();
        for (name, model) in classifiers.iter() {
            let predictions = model.predict(&classification.x_test.values).context(name)?;
            let metrics = ClassificationMetrics::compute(&classification.y_test, &predictions)?;
            info!("{} -> Accuracy: {:.3}, F1: {:.3}", name, metrics.accuracy, metrics.f1);
            debug!("{} classification report:\n{}", name, metrics.report_text);
            classification_metrics.insert(name.to_string(), metrics);
        }

        info!("Step 5: Deriving risk-based premiums");
        let aligned_rows = severity.y_test.len().min(classification.y_test.len());
        if aligned_rows < classification.y_test.len() {
            warn!(
                "Pricing only the first {} of {} classification test rows",
                aligned_rows,
                classification.y_test.len()
            );
        }

        let p_claim = classifiers
            .require(PRICING_CLASSIFIER)?
            .predict_proba(&classification.x_test.head(aligned_rows).values)?;
        let expected_claim: Vec<f64> = regressors
            .require(PRICING_REGRESSOR)?
            .predict(&severity.x_test.head(aligned_rows).values)?
            .into_iter()
            .map(|s| s.max(0.0))
            .collect();

        let premiums = compute_optimized_premium(&p_claim, &expected_claim, config.loading_factor)
            .context("Premium optimization")?;
        let premium_summary = PremiumSummary::from_premiums(&premiums, config.loading_factor);
        steps.push(format!(
            "Priced {} policies with loading factor {}",
            premiums.len(),
            config.loading_factor
        ));

        let report = ModelingReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            test_size: config.test_size,
            seed: config.seed,
            severity_data: DatasetSummary::of(&severity),
            classification_data: DatasetSummary::of(&classification),
            regression_metrics,
            classification_metrics,
            aligned_rows,
            claim_probability_model: PRICING_CLASSIFIER.to_string(),
            severity_model: PRICING_REGRESSOR.to_string(),
            premium_summary,
            processing_steps: steps,
        };

        info!("Modeling completed in {}ms", report.duration_ms);
        Ok(ModelingOutcome { report, premiums })
    }

    fn regressors(&self) -> Vec<(&'static str, Box<dyn Regressor>)> {
        let c = &self.config;
        let mut models: Vec<(&'static str, Box<dyn Regressor>)> = Vec::with_capacity(3);
        models.push((LINEAR_REGRESSION, Box::new(LinearRegression::new())));
        models.push((
            RANDOM_FOREST,
            Box::new(RandomForestRegressor::new(
                c.n_trees,
                c.forest_max_depth,
                c.min_samples_split,
                c.seed,
            )),
        ));
        models.push((
            GRADIENT_BOOSTING,
            Box::new(GradientBoostingRegressor::new(
                c.boosting_rounds,
                c.boosting_max_depth,
                c.learning_rate,
                c.min_samples_split,
                c.seed,
            )),
        ));
        models
    }

    fn classifiers(&self) -> Vec<(&'static str, Box<dyn Classifier>)> {
        let c = &self.config;
        let mut models: Vec<(&'static str, Box<dyn Classifier>)> = Vec::with_capacity(3);
        models.push((LOGISTIC_REGRESSION, Box::new(LogisticRegression::new(c.logistic_max_iter))));
        models.push((
            RANDOM_FOREST,
            Box::new(RandomForestClassifier::new(
                c.n_trees,
                c.forest_max_depth,
                c.min_samples_split,
                c.seed,
            )),
        ));
        models.push((
            GRADIENT_BOOSTING,
            Box::new(GradientBoostingClassifier::new(
                c.boosting_rounds,
                c.boosting_max_depth,
                c.learning_rate,
                c.min_samples_split,
                c.seed,
            )),
        ));
        models
    }

    fn train_regressors(&self, split: &TrainTestSplit<f64>) -> Result<ModelRoster<dyn Regressor>> {
        let mut roster = ModelRoster::new();
        for (name, mut model) in self.regressors() {
            debug!("Fitting {} on {} rows", name, split.y_train.len());
            model.fit(&split.x_train.values, &split.y_train).context(name)?;
            roster.insert(name, model);
        }
        Ok(roster)
    }

    fn train_classifiers(
        &self,
        split: &TrainTestSplit<bool>,
    ) -> Result<ModelRoster<dyn Classifier>> {
        let mut roster = ModelRoster::new();
        for (name, mut model) in self.classifiers() {
            debug!("Fitting {} on {} rows", name, split.y_train.len());
            model.fit(&split.x_train.values, &split.y_train).context(name)?;
            roster.insert(name, model);
        }
        Ok(roster)
    }
}
