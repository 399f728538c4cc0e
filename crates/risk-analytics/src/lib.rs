//! Insurance Risk Analytics Library
//!
//! Policy-level risk analytics built with Rust and Polars.
//!
//! # Overview
//!
//! This library turns a raw policy/claims extract into priced, tested
//! insights:
//!
//! - **Data Cleaning**: Placeholder standardization, title-based gender
//!   inference, mode and grouped-median imputation, sparse column pruning
//! - **Claim Metrics**: Loss ratio, claim occurrence, frequency, severity
//!   and margin per policy, plus a portfolio summary
//! - **Hypothesis Testing**: Welch t-tests and chi-squared independence
//!   tests for risk differences across provinces, postal codes and gender
//! - **Modeling**: Severity regressors and claim-occurrence classifiers
//!   trained on a seeded split and evaluated on held-out policies
//! - **Pricing**: Risk-based premium = claim probability x expected
//!   severity x loading factor
//! - **Progress Reporting**: Stage updates while cleaning
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use risk_analytics::{ModelingConfig, ModelingRun, Pipeline, PipelineConfig};
//!
//! // Clean the raw extract and write the cleaned table + summary
//! let config = PipelineConfig::builder()
//!     .output_dir("output")
//!     .build()?;
//!
//! let (cleaned, result) = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run_file("data/MachineLearningRating_v3.txt")?;
//!
//! if let Some(metrics) = &result.metrics {
//!     println!("Mean loss ratio: {:.4}", metrics.mean_loss_ratio);
//! }
//!
//! // Train the models and price the held-out policies
//! let outcome = ModelingRun::new(ModelingConfig::default())?.execute(&cleaned)?;
//! println!("{:?}", outcome.report.premium_summary);
//! ```
//!
//! # Hypothesis Tests
//!
//! ```rust,ignore
//! use risk_analytics::{HypothesisConfig, HypothesisSuite, load_cleaned_table};
//!
//! let mut df = load_cleaned_table("output/insurance_data_cleaned.csv")?;
//! let suite = HypothesisSuite::new(HypothesisConfig::new(0.05, "output")?);
//!
//! for result in suite.run(&mut df)? {
//!     println!("{}", serde_json::to_string(&result)?);
//! }
//! ```
//!
//! # Configuration
//!
//! [`PipelineConfig`], [`ModelingConfig`] and [`HypothesisConfig`] carry
//! defaults matching the usual insurance extract and validate on build:
//!
//! ```rust,ignore
//! use risk_analytics::ModelingConfig;
//!
//! let config = ModelingConfig::builder()
//!     .test_size(0.3)
//!     .seed(42)
//!     .loading_factor(1.2)
//!     .n_trees(200)
//!     .build()?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod imputers;
pub mod ingest;
pub mod metrics;
pub mod modeling;
pub mod optimization;
pub mod pipeline;
pub mod reporting;
pub mod stats;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{prune_columns, standardize_missing_values};
pub use config::{
    ConfigValidationError, HypothesisConfig, ModelingConfig, ModelingConfigBuilder, PipelineConfig,
    PipelineConfigBuilder, TitleGenderMap,
};
pub use error::{Result as RiskResult, ResultExt, RiskError};
pub use imputers::{
    GroupedFill, StatisticalImputer, impute_gender, impute_grouped_median, infer_gender,
};
pub use ingest::{load_cleaned_table, load_raw_table, require_columns};
pub use metrics::{
    attach_claim_metrics, attach_loss_ratio, claim_frequency, claim_occurred, claim_severity,
    compute_metrics_summary, loss_ratio, margin,
};
pub use modeling::{Classifier, ModelingOutcome, ModelingReport, ModelingRun, Regressor};
pub use optimization::{PremiumSummary, compute_optimized_premium};
pub use pipeline::{
    CleaningStage, ClosureProgressReporter, Pipeline, PipelineBuilder, ProgressReporter,
    ProgressUpdate,
};
pub use reporting::{ReportGenerator, RunReport};
pub use stats::{HypothesisSuite, chi_squared_test, t_test_groups};
pub use types::{
    ActionType, CleaningAction, CleaningSummary, HypothesisTestResult, MetricsSummary,
    PipelineResult,
};
pub use utils::{DtypeCategory, get_dtype_category, is_numeric_dtype, parse_numeric_string};
