//! Cleaning pipeline and its builder.
//!
//! Runs the raw policy table through placeholder standardization, gender
//! and categorical imputation, pruning, grouped numeric imputation and the
//! loss-ratio derivation, then writes the cleaned table and its summary.

use crate::cleaner::{prune_columns, standardize_missing_values};
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{Result, ResultExt};
use crate::imputers::{StatisticalImputer, impute_gender, impute_grouped_median};
use crate::ingest::{load_raw_table, require_columns};
use crate::metrics::{attach_loss_ratio, compute_metrics_summary};
use crate::pipeline::progress::{
    CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::reporting::ReportGenerator;
use crate::types::{ActionType, CleaningAction, CleaningSummary, PipelineResult, columns};
use crate::utils::total_null_count;
use polars::prelude::*;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;
use tracing::{error, info, warn};

/// The cleaning pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use risk_analytics::{Pipeline, PipelineConfig};
///
/// let config = PipelineConfig::builder().output_dir("output").build()?;
///
/// let (cleaned, result) = Pipeline::builder()
///     .config(config)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run_file("data/MachineLearningRating_v3.txt")?;
///
/// println!("Mean loss ratio: {:?}", result.metrics.map(|m| m.mean_loss_ratio));
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Rc<dyn ProgressReporter>>,
    reporter: ReportGenerator,
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a raw policy file and clean it.
    ///
    /// Every required raw column must be present. Returns the cleaned table
    /// together with the run's result.
    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<(DataFrame, PipelineResult)> {
        let mut df = match self.load(path.as_ref()) {
            Ok(df) => df,
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                return Err(e);
            }
        };

        let result = self.process(&mut df)?;
        Ok((df, result))
    }

    /// Clean a DataFrame in place.
    ///
    /// Nothing is written to disk unless every stage succeeded.
    pub fn process(&self, df: &mut DataFrame) -> Result<PipelineResult> {
        match self.process_internal(df) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Cleaning completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn load(&self, path: &Path) -> Result<DataFrame> {
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Loading,
            0.0,
            format!("Loading {}", path.display()),
        ));

        let df = load_raw_table(path, self.config.separator, self.config.infer_schema_length)?;
        require_columns(&df, &columns::REQUIRED_RAW).context("Loading raw data")?;

        info!("Loaded {} rows x {} columns", df.height(), df.width());
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Loading,
            1.0,
            format!("Loaded {} rows", df.height()),
        ));
        Ok(df)
    }

    fn process_internal(&self, df: &mut DataFrame) -> Result<PipelineResult> {
        let start_time = Instant::now();
        info!("Starting cleaning pipeline...");

        let mut summary = CleaningSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();
        summary.missing_before = total_null_count(df);

        let mut processing_steps: Vec<String> = Vec::new();

        // Step 1: Placeholder standardization
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Standardizing,
            0.0,
            "Standardizing missing-value placeholders...",
        ));
        info!("Step 1: Standardizing missing-value placeholders...");

        let replaced = standardize_missing_values(
            df,
            &self.config.standardize_columns,
            &self.config.placeholders,
        )?;
        for (col, count) in replaced.iter().filter(|(_, count)| **count > 0) {
            summary.add_action(CleaningAction::new(
                ActionType::ValueStandardized,
                col,
                format!("Replaced {} placeholder values with missing", count),
            ));
            processing_steps.push(format!(
                "Standardized {} placeholder values in '{}'",
                count, col
            ));
        }

        // Step 2: Gender from Title
        self.report_progress(ProgressUpdate::new(
            CleaningStage::GenderImputation,
            0.0,
            "Inferring Gender from Title...",
        ));
        info!("Step 2: Inferring Gender from Title...");

        let gender_filled = impute_gender(df, &self.config.title_map)?;
        summary.record_imputed(columns::GENDER, gender_filled);
        summary.add_action(
            CleaningAction::new(
                ActionType::ValueImputed,
                columns::GENDER,
                format!("Filled {} missing values from Title", gender_filled),
            )
            .with_details(format!("{} title mappings", self.config.title_map.len())),
        );
        processing_steps.push(format!("Inferred {} Gender values from Title", gender_filled));

        let gender_missing = df.column(columns::GENDER)?.null_count();
        if gender_missing > 0 {
            warn!("{} rows keep a missing Gender (title missing or unmapped)", gender_missing);
            summary.add_warning(format!(
                "{} rows keep a missing Gender (title missing or unmapped)",
                gender_missing
            ));
        }

        // Step 3: Mode imputation of categoricals
        info!("Step 3: Mode imputation of categorical columns...");
        let total = self.config.mode_columns.len();
        for (i, col) in self.config.mode_columns.iter().enumerate() {
            self.report_progress(ProgressUpdate::for_column(
                CleaningStage::CategoricalImputation,
                col,
                i,
                total,
                format!("Filling '{}' with its mode", col),
            ));
            let filled = StatisticalImputer::apply_mode_imputation(df, col, &mut processing_steps)
                .context("Categorical imputation")?;
            summary.record_imputed(col, filled);
            if filled > 0 {
                summary.add_action(CleaningAction::new(
                    ActionType::ValueImputed,
                    col,
                    format!("Filled {} missing values with the mode", filled),
                ));
            }
        }

        // Step 4: Column pruning
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Pruning,
            0.0,
            "Dropping unused columns...",
        ));
        info!("Step 4: Dropping unused columns...");

        let dropped = prune_columns(df, &self.config.drop_columns);
        for col in &dropped {
            summary.add_action(CleaningAction::new(
                ActionType::ColumnRemoved,
                col,
                "Dropped unused column",
            ));
        }
        if !dropped.is_empty() {
            processing_steps.push(format!("Dropped columns: {}", dropped.join(", ")));
        }
        summary.dropped_columns = dropped;

        // Step 5: Grouped median of the vehicle value estimate
        self.report_progress(ProgressUpdate::new(
            CleaningStage::NumericImputation,
            0.0,
            format!(
                "Filling '{}' with '{}' group medians...",
                self.config.grouped_target, self.config.group_key
            ),
        ));
        info!("Step 5: Grouped median imputation...");

        let fill = impute_grouped_median(df, &self.config.grouped_target, &self.config.group_key)?;
        summary.record_imputed(&self.config.grouped_target, fill.total());
        summary.add_action(
            CleaningAction::new(
                ActionType::ValueImputed,
                &self.config.grouped_target,
                format!("Filled {} missing values with medians", fill.total()),
            )
            .with_details(format!(
                "{} from '{}' group medians, {} from the global median",
                fill.from_group, self.config.group_key, fill.from_global
            )),
        );
        processing_steps.push(format!(
            "Filled {} missing values in '{}' ({} by '{}' group, {} globally)",
            fill.total(),
            self.config.grouped_target,
            fill.from_group,
            self.config.group_key,
            fill.from_global
        ));

        // Step 6: Derived metrics
        self.report_progress(ProgressUpdate::new(
            CleaningStage::DerivedMetrics,
            0.0,
            "Deriving loss ratio...",
        ));
        info!("Step 6: Deriving loss ratio...");

        attach_loss_ratio(df)?;
        summary.add_action(CleaningAction::new(
            ActionType::MetricDerived,
            columns::LOSS_RATIO,
            "TotalClaims / TotalPremium (1 where the premium is zero)",
        ));
        processing_steps.push("Derived LossRatio".to_string());

        let written_off_filled = StatisticalImputer::apply_mode_imputation(
            df,
            columns::WRITTEN_OFF,
            &mut processing_steps,
        )
        .context("Written-off imputation")?;
        summary.record_imputed(columns::WRITTEN_OFF, written_off_filled);

        let metrics = compute_metrics_summary(df)?;
        self.report_progress(ProgressUpdate::new(
            CleaningStage::DerivedMetrics,
            1.0,
            format!("Mean loss ratio: {:.4}", metrics.mean_loss_ratio),
        ));

        // Step 7: Outputs
        let (cleaned_data, metrics_file) = if self.config.save_to_disk {
            self.report_progress(ProgressUpdate::new(
                CleaningStage::Writing,
                0.0,
                "Writing cleaned table and summary...",
            ));
            info!("Step 7: Writing outputs...");

            let cleaned_path = self
                .reporter
                .write_cleaned_table(df, &self.config.cleaned_file_name)?;
            let summary_path = self
                .reporter
                .write_metrics_summary(&metrics, &self.config.summary_file_name)?;

            self.report_progress(ProgressUpdate::new(
                CleaningStage::Writing,
                1.0,
                "Output files saved",
            ));
            (
                Some(cleaned_path.display().to_string()),
                Some(summary_path.display().to_string()),
            )
        } else {
            info!("Step 7: Skipping output files (save_to_disk disabled)");
            (None, None)
        };

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        summary.rows_after = df.height();
        summary.columns_after = df.width();
        summary.missing_after = total_null_count(df);

        if summary.columns_removed_percentage() > 50.0 {
            summary.add_warning(format!(
                "High feature loss: {:.1}% of columns were removed",
                summary.columns_removed_percentage()
            ));
        }

        info!(
            "Cleaning finished: {} rows, {} columns, {} cells imputed",
            summary.rows_after,
            summary.columns_after,
            summary.total_imputed()
        );

        Ok(PipelineResult {
            success: true,
            cleaned_data,
            metrics_file,
            processing_steps,
            metrics: Some(metrics),
            error: None,
            summary: Some(summary),
        })
    }
}

/// Builder for creating a [`Pipeline`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?;
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Rc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use risk_analytics::{ProgressReporter, ProgressUpdate};
    /// use std::rc::Rc;
    ///
    /// struct StageLogger;
    ///
    /// impl ProgressReporter for StageLogger {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let pipeline = Pipeline::builder()
    ///     .progress_reporter(Rc::new(StageLogger))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Rc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + 'static,
    {
        self.progress_reporter = Some(Rc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let reporter = ReportGenerator::new(config.output_dir.clone());

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            reporter,
        })
    }
}
