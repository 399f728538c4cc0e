//! Integration tests for the risk analytics pipeline.
//!
//! These tests run cleaning, hypothesis testing and modeling end to end on
//! a small pipe-delimited policy extract.

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use risk_analytics::reporting::{CLEANED_FILE, SUMMARY_FILE};
use risk_analytics::{
    CleaningStage, HypothesisConfig, HypothesisSuite, HypothesisTestResult, ModelingConfig,
    ModelingRun, Pipeline, PipelineConfig, ProgressUpdate, ReportGenerator, RiskError, RunReport,
    load_cleaned_table,
};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::{TempDir, tempdir};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn sample_file() -> PathBuf {
    fixtures_path().join("insurance_sample.txt")
}

fn pipeline_into(output: &Path) -> Pipeline {
    Pipeline::builder()
        .config(PipelineConfig::builder().output_dir(output).build().unwrap())
        .build()
        .unwrap()
}

/// Clean the fixture into a fresh directory and reload the written table.
fn cleaned_fixture() -> (TempDir, polars::prelude::DataFrame) {
    let dir = tempdir().unwrap();
    pipeline_into(dir.path()).run_file(sample_file()).unwrap();
    let df = load_cleaned_table(dir.path().join(CLEANED_FILE)).unwrap();
    (dir, df)
}

fn small_modeling_config() -> ModelingConfig {
    ModelingConfig::builder().n_trees(15).boosting_rounds(15).build().unwrap()
}

// ============================================================================
// Cleaning
// ============================================================================

#[test]
fn test_clean_fixture_writes_table_and_summary() {
    let dir = tempdir().unwrap();
    let (df, result) = pipeline_into(dir.path()).run_file(sample_file()).unwrap();

    assert!(result.success);
    assert_eq!(df.height(), 48);
    assert_eq!(df.width(), 19);

    let cleaned_path = dir.path().join(CLEANED_FILE);
    let summary_path = dir.path().join(SUMMARY_FILE);
    assert_eq!(result.cleaned_data.as_deref(), Some(cleaned_path.display().to_string().as_str()));
    assert!(summary_path.exists());

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["rows"], 48);
    assert_eq!(summary["columns"], 19);
    assert_eq!(summary["missing_values"], 0);
    assert_relative_eq!(
        summary["mean_loss_ratio"].as_f64().unwrap(),
        3.1019892288369277,
        epsilon = 1e-9
    );
    assert_relative_eq!(summary["writtenoff_ratio"].as_f64().unwrap(), 4.0 / 48.0, epsilon = 1e-12);
}

#[test]
fn test_cleaned_table_has_no_gaps_in_imputed_columns() {
    let (_dir, df) = cleaned_fixture();

    let imputed = [
        "Gender",
        "Bank",
        "AccountType",
        "CustomValueEstimate",
        "WrittenOff",
        "LossRatio",
    ];
    for column in imputed {
        assert_eq!(df.column(column).unwrap().null_count(), 0, "nulls left in {column}");
    }
    for dropped in ["PolicyID", "UnderwrittenCoverID", "Title", "Country", "CrossBorder"] {
        assert!(df.column(dropped).is_err(), "{dropped} should be pruned");
    }
}

#[test]
fn test_clean_fixture_summary_counts() {
    let dir = tempdir().unwrap();
    let (_, result) = pipeline_into(dir.path()).run_file(sample_file()).unwrap();
    let summary = result.summary.unwrap();

    assert_eq!(summary.rows_before, 48);
    assert_eq!(summary.columns_before, 27);
    assert_eq!(summary.missing_after, 0);
    assert_eq!(summary.imputed_counts["Gender"], 24);
    assert_eq!(summary.imputed_counts["Bank"], 5);
    assert_eq!(summary.imputed_counts["AccountType"], 4);
    assert_eq!(summary.imputed_counts["CustomValueEstimate"], 8);
    assert_eq!(summary.imputed_counts["WrittenOff"], 3);
    assert_eq!(summary.dropped_columns.len(), 9);
}

#[test]
fn test_gender_filled_from_title() {
    let dir = tempdir().unwrap();
    let (df, _) = pipeline_into(dir.path()).run_file(sample_file()).unwrap();
    let gender: Vec<Option<&str>> =
        df.column("Gender").unwrap().str().unwrap().into_iter().collect();

    // row 2 is "Ms" with a placeholder, row 3 "Mr" with an empty field,
    // row 6 "Dr" which maps back to "Not specified"
    assert_eq!(gender[2], Some("Female"));
    assert_eq!(gender[3], Some("Male"));
    assert_eq!(gender[6], Some("Not specified"));
}

#[test]
fn test_progress_stages_in_order() {
    let dir = tempdir().unwrap();
    let stages: Rc<RefCell<Vec<CleaningStage>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&stages);

    Pipeline::builder()
        .config(PipelineConfig::builder().output_dir(dir.path()).build().unwrap())
        .on_progress(move |update: ProgressUpdate| sink.borrow_mut().push(update.stage))
        .build()
        .unwrap()
        .run_file(sample_file())
        .unwrap();

    let mut seen = stages.borrow().clone();
    seen.dedup();
    assert_eq!(
        seen,
        vec![
            CleaningStage::Loading,
            CleaningStage::Standardizing,
            CleaningStage::GenderImputation,
            CleaningStage::CategoricalImputation,
            CleaningStage::Pruning,
            CleaningStage::NumericImputation,
            CleaningStage::DerivedMetrics,
            CleaningStage::Writing,
            CleaningStage::Complete,
        ]
    );
}

#[test]
fn test_missing_required_column_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("no_written_off.txt");
    let content = fs::read_to_string(sample_file()).unwrap();
    let stripped: Vec<String> = content
        .lines()
        .map(|line| {
            let mut fields: Vec<&str> = line.split('|').collect();
            fields.remove(24);
            fields.join("|")
        })
        .collect();
    fs::write(&input, stripped.join("\n")).unwrap();

    let output = dir.path().join("out");
    let err = pipeline_into(&output).run_file(&input).unwrap_err();

    assert!(matches!(err.root(), RiskError::ColumnNotFound(name) if name == "WrittenOff"));
    assert!(!output.join(CLEANED_FILE).exists());
    assert!(!output.join(SUMMARY_FILE).exists());
}

#[test]
fn test_missing_input_file() {
    let dir = tempdir().unwrap();
    let err = pipeline_into(dir.path())
        .run_file(fixtures_path().join("does_not_exist.txt"))
        .unwrap_err();
    assert_eq!(err.root().error_code(), "FILE_NOT_FOUND");
}

// ============================================================================
// Hypothesis tests
// ============================================================================

#[test]
fn test_hypothesis_battery_on_cleaned_fixture() {
    let (dir, mut df) = cleaned_fixture();
    let suite = HypothesisSuite::new(HypothesisConfig::new(0.05, dir.path()).unwrap());
    let results = suite.run(&mut df).unwrap();

    assert_eq!(results.len(), 5);
    match &results[0] {
        HypothesisTestResult::TTest {
            group_col,
            group_a,
            group_b,
            n_a,
            n_b,
            ..
        } => {
            assert_eq!(group_col, "Province");
            assert_eq!((group_a.as_str(), group_b.as_str()), ("Gauteng", "Western Cape"));
            assert_eq!((*n_a, *n_b), (16, 16));
        }
        other => panic!("expected a t-test, got {other:?}"),
    }
    match &results[4] {
        HypothesisTestResult::ChiSquared { dof, .. } => assert_eq!(*dof, 2),
        other => panic!("expected a chi-squared test, got {other:?}"),
    }
    assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.p_value())));
}

#[test]
fn test_hypothesis_results_written_as_tagged_json() {
    let (dir, mut df) = cleaned_fixture();
    let config = HypothesisConfig::new(0.05, dir.path()).unwrap();
    let results = HypothesisSuite::new(config.clone()).run(&mut df).unwrap();

    let path = ReportGenerator::new(dir.path())
        .write_hypothesis_results(&results, &config.results_file_name)
        .unwrap();
    assert_eq!(path, config.results_path());

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    let tags: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["test"].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["t_test", "t_test", "t_test", "t_test", "chi_squared"]);
}

// ============================================================================
// Modeling and pricing
// ============================================================================

#[test]
fn test_modeling_on_cleaned_fixture() {
    let (_dir, df) = cleaned_fixture();
    let outcome = ModelingRun::new(small_modeling_config()).unwrap().execute(&df).unwrap();
    let report = &outcome.report;

    assert_eq!(report.severity_data.rows, 10);
    assert_eq!(report.severity_data.test_rows, 3);
    assert_eq!(report.classification_data.rows, 48);
    assert_eq!(report.classification_data.test_rows, 15);
    assert_eq!(report.regression_metrics.len(), 3);
    assert_eq!(report.classification_metrics.len(), 3);

    assert_eq!(report.aligned_rows, 3);
    assert_eq!(outcome.premiums.len(), 3);
    assert!(outcome.premiums.iter().all(|p| *p >= 0.0));
    assert_eq!(report.premium_summary.as_ref().unwrap().loading_factor, 1.2);
}

#[test]
fn test_modeling_after_hypothesis_tests_ignores_derived_columns() {
    let (_dir, mut df) = cleaned_fixture();
    let before = ModelingRun::new(small_modeling_config()).unwrap().execute(&df).unwrap();

    HypothesisSuite::new(HypothesisConfig::default()).run(&mut df).unwrap();
    let after = ModelingRun::new(small_modeling_config()).unwrap().execute(&df).unwrap();

    assert_eq!(
        before.report.classification_data.features,
        after.report.classification_data.features
    );
    assert_eq!(before.premiums, after.premiums);
}

#[test]
fn test_full_run_report() {
    let dir = tempdir().unwrap();
    let (mut df, result) = pipeline_into(dir.path()).run_file(sample_file()).unwrap();

    let mut report = RunReport::new(sample_file().display().to_string());
    report.cleaning = result.summary.clone();
    report.metrics = result.metrics.clone();
    report.hypothesis_tests = HypothesisSuite::new(HypothesisConfig::default())
        .run(&mut df)
        .unwrap();
    report.modeling = Some(
        ModelingRun::new(small_modeling_config())
            .unwrap()
            .execute(&df)
            .unwrap()
            .report,
    );

    let path = ReportGenerator::new(dir.path())
        .write_report_to_file(&report, "insurance_sample")
        .unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(value["metrics"]["rows"], 48);
    assert_eq!(value["hypothesis_tests"].as_array().unwrap().len(), 5);
    assert_eq!(value["modeling"]["claim_probability_model"], "GradientBoosting");
    assert_eq!(value["modeling"]["severity_model"], "RandomForest");
}
