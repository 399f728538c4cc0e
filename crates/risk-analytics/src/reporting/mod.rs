//! Report generation module.
//!
//! This module writes everything a run produces into the output directory:
//! the cleaned table, the metrics summary, hypothesis test results, the
//! modeling report and the priced policies.
//!
//! # Run Reports
//!
//! [`RunReport`] gathers the sections of a full `run` for:
//! - JSON output to stdout (`--json` CLI flag)
//! - A JSON file next to the other outputs
//!
//! # Example
//!
//! ```rust,ignore
//! use risk_analytics::reporting::{ReportGenerator, RunReport};
//!
//! let generator = ReportGenerator::new("output");
//! let mut report = RunReport::new("data/MachineLearningRating_v3.txt");
//! report.metrics = Some(metrics);
//! generator.write_report_to_file(&report, "insurance")?;
//! ```

mod generator;

pub use generator::{
    CLEANED_FILE, HYPOTHESIS_FILE, MODEL_REPORT_FILE, PREMIUMS_FILE, ReportGenerator, RunReport,
    SUMMARY_FILE,
};
