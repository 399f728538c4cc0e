use crate::error::{Result, ResultExt, RiskError};
use crate::modeling::ModelingReport;
use crate::types::{CleaningSummary, HypothesisTestResult, MetricsSummary};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default file names inside the output directory.
pub const CLEANED_FILE: &str = "insurance_data_cleaned.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const HYPOTHESIS_FILE: &str = "hypothesis_test_results.json";
pub const MODEL_REPORT_FILE: &str = "model_report.json";
pub const PREMIUMS_FILE: &str = "optimized_premiums.csv";

/// Combined report of one `run` invocation, printed under `--json` and
/// written as `<name>_report.json`.
///
/// Sections are `None` when their stage did not run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub input_file: String,
    /// Files written by every stage, in order
    pub output_files: Vec<String>,

    pub cleaning: Option<CleaningSummary>,
    pub metrics: Option<MetricsSummary>,
    pub hypothesis_tests: Vec<HypothesisTestResult>,
    pub modeling: Option<ModelingReport>,

    pub processing_steps: Vec<String>,
}

impl RunReport {
    pub fn new(input_file: impl Into<String>) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.into(),
            output_files: Vec::new(),
            cleaning: None,
            metrics: None,
            hypothesis_tests: Vec::new(),
            modeling: None,
            processing_steps: Vec::new(),
        }
    }

    pub fn add_output(&mut self, path: &Path) {
        self.output_files.push(path.display().to_string());
    }
}

/// Writes tables and reports into one output directory, creating it on
/// first use.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn prepare(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.trim().is_empty() {
            return Err(RiskError::ReportGenerationFailed("output file name is empty".to_string()));
        }
        fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(file_name))
    }

    /// Save a table as comma-separated CSV with a header row.
    pub fn write_cleaned_table(&self, df: &mut DataFrame, file_name: &str) -> Result<PathBuf> {
        let output_path = self.prepare(file_name)?;
        let mut file = File::create(&output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)
            .context("Writing cleaned table")?;

        info!(
            "Cleaned data saved: {} ({} rows x {} columns)",
            output_path.display(),
            df.height(),
            df.width()
        );
        Ok(output_path)
    }

    /// Serialize any value as pretty-printed JSON.
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T, file_name: &str) -> Result<PathBuf> {
        let output_path = self.prepare(file_name)?;
        let mut file = File::create(&output_path)?;
        file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;

        debug!("JSON written: {}", output_path.display());
        Ok(output_path)
    }

    pub fn write_metrics_summary(
        &self,
        metrics: &MetricsSummary,
        file_name: &str,
    ) -> Result<PathBuf> {
        let path = self.write_json(metrics, file_name)?;
        info!("Metrics summary saved: {}", path.display());
        Ok(path)
    }

    pub fn write_hypothesis_results(
        &self,
        results: &[HypothesisTestResult],
        file_name: &str,
    ) -> Result<PathBuf> {
        let path = self.write_json(results, file_name)?;
        info!("{} hypothesis test results saved: {}", results.len(), path.display());
        Ok(path)
    }

    pub fn write_modeling_report(
        &self,
        report: &ModelingReport,
        file_name: &str,
    ) -> Result<PathBuf> {
        let path = self.write_json(report, file_name)?;
        info!("Modeling report saved: {}", path.display());
        Ok(path)
    }

    /// Save premiums as a one-column CSV (`OptimizedPremium`).
    pub fn write_premiums(&self, premiums: &[f64], file_name: &str) -> Result<PathBuf> {
        let mut df = DataFrame::new(vec![Column::new("OptimizedPremium".into(), premiums)])?;
        let output_path = self.prepare(file_name)?;
        let mut file = File::create(&output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut df)
            .context("Writing premiums")?;

        info!("{} premiums saved: {}", premiums.len(), output_path.display());
        Ok(output_path)
    }

    /// Write a run report as `<report_base_name>_report.json`.
    pub fn write_report_to_file(
        &self,
        report: &RunReport,
        report_base_name: &str,
    ) -> Result<PathBuf> {
        let path = self.write_json(report, &format!("{}_report.json", report_base_name))?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }
}
