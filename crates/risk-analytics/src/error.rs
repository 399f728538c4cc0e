//! Custom error types for the risk analytics pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Every stage of
//! the pipeline (ingestion, cleaning, metrics, modeling, hypothesis testing)
//! reports failures through [`RiskError`], so the CLI can print a single
//! diagnostic naming the failing stage and column or file.
//!
//! Errors are serializable so they can be embedded in JSON reports.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the risk analytics pipeline.
#[derive(Error, Debug)]
pub enum RiskError {
    /// Source file does not exist.
    #[error("File '{0}' not found")]
    FileNotFound(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid arguments passed to a computation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// A statistical test group has too few observations.
    #[error("Group '{group}' has {found} non-missing observations, at least {required} required")]
    InsufficientObservations {
        group: String,
        found: usize,
        required: usize,
    },

    /// Test statistic is undefined for the supplied data.
    #[error("Degenerate test statistic: {0}")]
    DegenerateStatistic(String),

    /// Contingency table cannot support a chi-squared test.
    #[error("Degenerate contingency table for '{row}' x '{column}': {reason}")]
    DegenerateContingency {
        row: String,
        column: String,
        reason: String,
    },

    /// Two inputs that must be aligned have different lengths.
    #[error("Length mismatch: '{left}' has {left_len} values, '{right}' has {right_len}")]
    LengthMismatch {
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },

    /// Model fitting failed.
    #[error("Failed to train model '{model}': {reason}")]
    TrainingFailed { model: String, reason: String },

    /// Report generation failed.
    #[error("Failed to generate report: {0}")]
    ReportGenerationFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RiskError>,
    },
}

impl RiskError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RiskError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &RiskError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get a stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::InsufficientObservations { .. } => "INSUFFICIENT_OBSERVATIONS",
            Self::DegenerateStatistic(_) => "DEGENERATE_STATISTIC",
            Self::DegenerateContingency { .. } => "DEGENERATE_CONTINGENCY",
            Self::LengthMismatch { .. } => "LENGTH_MISMATCH",
            Self::TrainingFailed { .. } => "TRAINING_FAILED",
            Self::ReportGenerationFailed(_) => "REPORT_GENERATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is an input error (bad file or schema) as opposed
    /// to a data or computation failure.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::FileNotFound(_) | Self::ColumnNotFound(_) | Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }

    /// Check if this error comes from degenerate data (all-missing columns,
    /// too few observations, undefined statistics).
    pub fn is_degenerate_data(&self) -> bool {
        match self {
            Self::NoValidValues(_)
            | Self::InsufficientObservations { .. }
            | Self::DegenerateStatistic(_)
            | Self::DegenerateContingency { .. } => true,
            Self::WithContext { source, .. } => source.is_degenerate_data(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for RiskError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("RiskError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| RiskError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            RiskError::FileNotFound("raw.txt".to_string()).error_code(),
            "FILE_NOT_FOUND"
        );
        assert_eq!(
            RiskError::ColumnNotFound("Gender".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(RiskError::ColumnNotFound("Bank".to_string()).is_input_error());
        assert!(!RiskError::NoValidValues("Bank".to_string()).is_input_error());
        assert!(RiskError::NoValidValues("Bank".to_string()).is_degenerate_data());
        assert!(
            RiskError::InsufficientObservations {
                group: "Gauteng".to_string(),
                found: 1,
                required: 2,
            }
            .is_degenerate_data()
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = RiskError::ColumnNotFound("TotalPremium".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("TotalPremium"));
    }

    #[test]
    fn test_with_context() {
        let error =
            RiskError::ColumnNotFound("Title".to_string()).with_context("Gender imputation");
        assert!(error.to_string().contains("Gender imputation"));
        assert!(error.to_string().contains("Title"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
        assert!(error.is_input_error());
        assert!(matches!(error.root(), RiskError::ColumnNotFound(c) if c == "Title"));
    }

    #[test]
    fn test_length_mismatch_message() {
        let error = RiskError::LengthMismatch {
            left: "p_claim".to_string(),
            left_len: 3,
            right: "expected_claim".to_string(),
            right_len: 2,
        };
        let msg = error.to_string();
        assert!(msg.contains("p_claim"));
        assert!(msg.contains('3'));
        assert!(msg.contains("expected_claim"));
    }
}
