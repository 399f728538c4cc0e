//! Progress reporting for the cleaning pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use risk_analytics::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process(df);
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the cleaning pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    /// Reading and validating the raw table
    Loading,
    /// Replacing placeholder strings with missing markers
    Standardizing,
    /// Filling Gender from Title
    GenderImputation,
    /// Mode fill of categorical columns
    CategoricalImputation,
    /// Dropping unused columns
    Pruning,
    /// Group-median fill of the vehicle value estimate
    NumericImputation,
    /// Loss ratio and written-off fill
    DerivedMetrics,
    /// Writing the cleaned table and summary
    Writing,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl CleaningStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Data",
            Self::Standardizing => "Standardizing Missing Values",
            Self::GenderImputation => "Imputing Gender",
            Self::CategoricalImputation => "Imputing Categoricals",
            Self::Pruning => "Pruning Columns",
            Self::NumericImputation => "Imputing Vehicle Values",
            Self::DerivedMetrics => "Deriving Metrics",
            Self::Writing => "Writing Outputs",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Returns the share of overall progress this stage accounts for.
    ///
    /// The weights of the working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.25,
            Self::Standardizing => 0.10,
            Self::GenderImputation => 0.10,
            Self::CategoricalImputation => 0.10,
            Self::Pruning => 0.05,
            Self::NumericImputation => 0.10,
            Self::DerivedMetrics => 0.10,
            Self::Writing => 0.20,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Standardizing => 0.25,
            Self::GenderImputation => 0.35,
            Self::CategoricalImputation => 0.45,
            Self::Pruning => 0.55,
            Self::NumericImputation => 0.60,
            Self::DerivedMetrics => 0.70,
            Self::Writing => 0.80,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update emitted at stage boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: CleaningStage,

    /// Optional sub-stage description (e.g., "Column: Bank")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage.
    pub fn new(stage: CleaningStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a progress update for one of `total` columns within a stage.
    pub fn for_column(
        stage: CleaningStage,
        column: &str,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(format!("Column: {column}")),
            ..Self::new(stage, stage_progress, message)
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Complete, 1.0, message)
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Failed, 0.0, message)
    }
}

/// Trait for receiving progress updates during cleaning.
pub trait ProgressReporter {
    /// Called at every stage boundary and once per imputed column.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate),
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate),
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate),
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}
