//! Configuration types for the risk analytics pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. Lookup tables (placeholder set,
//! title map, drop list) are plain values injected into the cleaning stages.

use crate::types::columns;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Strings that stand for "no value" in the raw policy file.
pub const DEFAULT_PLACEHOLDERS: [&str; 5] = ["", "Not specified", "Unknown", "NA", "N/A"];

/// Columns dropped after categorical cleaning.
pub const DEFAULT_DROP_COLUMNS: [&str; 9] = [
    "UnderwrittenCoverID",
    columns::POLICY_ID,
    "Language",
    "Country",
    "Rebuilt",
    "Converted",
    "CrossBorder",
    "NumberOfVehiclesInFleet",
    columns::TITLE,
];

/// Identifier-like columns excluded from model features.
pub const DEFAULT_HIGH_CARDINALITY_COLUMNS: [&str; 4] = [
    columns::POLICY_ID,
    columns::POSTAL_CODE,
    columns::MODEL,
    columns::MAKE,
];

static DEFAULT_TITLE_MAP: Lazy<TitleGenderMap> = Lazy::new(|| {
    TitleGenderMap::from_pairs([
        ("Mr", "Male"),
        ("Mrs", "Female"),
        ("Ms", "Female"),
        ("Miss", "Female"),
        ("Dr", "Not specified"),
    ])
});

/// Immutable title -> gender lookup used to fill missing Gender values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleGenderMap(BTreeMap<String, String>);

impl TitleGenderMap {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Gender for a title, if the title is mapped.
    pub fn lookup(&self, title: &str) -> Option<&str> {
        self.0.get(title).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TitleGenderMap {
    fn default() -> Self {
        DEFAULT_TITLE_MAP.clone()
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Configuration for the cleaning pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use risk_analytics::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .output_dir("metrics")
///     .separator(b'|')
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Field separator of the raw policy file.
    /// Default: b'|'
    pub separator: u8,

    /// Number of rows used for schema inference when loading.
    /// Default: 10000
    pub infer_schema_length: usize,

    /// Placeholder strings replaced by missing markers (exact match).
    pub placeholders: Vec<String>,

    /// Columns whose placeholders are standardized.
    /// Default: Gender, Bank, AccountType
    pub standardize_columns: Vec<String>,

    /// Title -> gender lookup used to fill missing Gender.
    pub title_map: TitleGenderMap,

    /// Columns filled with their most frequent value before pruning.
    /// Default: Bank, AccountType
    pub mode_columns: Vec<String>,

    /// Columns removed when present.
    pub drop_columns: Vec<String>,

    /// Numeric column filled with group medians.
    /// Default: CustomValueEstimate
    pub grouped_target: String,

    /// Grouping key for the grouped median fill.
    /// Default: make
    pub group_key: String,

    /// Output directory for the cleaned table and summary.
    /// Default: "output"
    pub output_dir: PathBuf,

    /// File name of the cleaned table.
    /// Default: "insurance_data_cleaned.csv"
    pub cleaned_file_name: String,

    /// File name of the metrics summary.
    /// Default: "summary.json"
    pub summary_file_name: String,

    /// Whether to write the cleaned table and summary to disk.
    /// When false, results are kept in memory only.
    /// Default: true
    pub save_to_disk: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            separator: b'|',
            infer_schema_length: 10_000,
            placeholders: to_strings(&DEFAULT_PLACEHOLDERS),
            standardize_columns: to_strings(&[
                columns::GENDER,
                columns::BANK,
                columns::ACCOUNT_TYPE,
            ]),
            title_map: TitleGenderMap::default(),
            mode_columns: to_strings(&[columns::BANK, columns::ACCOUNT_TYPE]),
            drop_columns: to_strings(&DEFAULT_DROP_COLUMNS),
            grouped_target: columns::CUSTOM_VALUE_ESTIMATE.to_string(),
            group_key: columns::MAKE.to_string(),
            output_dir: PathBuf::from("output"),
            cleaned_file_name: "insurance_data_cleaned.csv".to_string(),
            summary_file_name: "summary.json".to_string(),
            save_to_disk: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Path of the cleaned CSV.
    pub fn cleaned_path(&self) -> PathBuf {
        self.output_dir.join(&self.cleaned_file_name)
    }

    /// Path of the metrics summary JSON.
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.summary_file_name)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.infer_schema_length == 0 {
            return Err(ConfigValidationError::InvalidCount {
                field: "infer_schema_length".to_string(),
                value: 0,
            });
        }

        if self.grouped_target.is_empty() || self.group_key.is_empty() {
            return Err(ConfigValidationError::EmptyColumnName(
                "grouped_target/group_key".to_string(),
            ));
        }

        if self.cleaned_file_name.is_empty() || self.summary_file_name.is_empty() {
            return Err(ConfigValidationError::EmptyColumnName(
                "output file name".to_string(),
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be in {range})")]
    OutOfRange {
        field: String,
        value: f64,
        range: String,
    },

    #[error("Invalid count for '{field}': {value} (must be at least 1)")]
    InvalidCount { field: String, value: usize },

    #[error("Empty name for {0}")]
    EmptyColumnName(String),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    separator: Option<u8>,
    infer_schema_length: Option<usize>,
    placeholders: Option<Vec<String>>,
    standardize_columns: Option<Vec<String>>,
    title_map: Option<TitleGenderMap>,
    mode_columns: Option<Vec<String>>,
    drop_columns: Option<Vec<String>>,
    grouped_target: Option<String>,
    group_key: Option<String>,
    output_dir: Option<PathBuf>,
    save_to_disk: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the field separator of the raw file.
    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Set the number of rows used to infer the schema.
    pub fn infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = Some(rows);
        self
    }

    /// Replace the placeholder set.
    pub fn placeholders<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.placeholders = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Set the columns whose placeholders are standardized.
    pub fn standardize_columns<S: Into<String>>(
        mut self,
        cols: impl IntoIterator<Item = S>,
    ) -> Self {
        self.standardize_columns = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    /// Inject a title -> gender table.
    pub fn title_map(mut self, map: TitleGenderMap) -> Self {
        self.title_map = Some(map);
        self
    }

    /// Set the columns filled with their mode.
    pub fn mode_columns<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.mode_columns = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    /// Set the columns removed by the pruner.
    pub fn drop_columns<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.drop_columns = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    /// Set the target and key of the grouped median fill.
    pub fn grouped_imputation(mut self, target: impl Into<String>, key: impl Into<String>) -> Self {
        self.grouped_target = Some(target.into());
        self.group_key = Some(key.into());
        self
    }

    /// Set the output directory for the cleaned data and summary.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Enable or disable saving outputs to disk.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            separator: self.separator.unwrap_or(defaults.separator),
            infer_schema_length: self.infer_schema_length.unwrap_or(defaults.infer_schema_length),
            placeholders: self.placeholders.unwrap_or(defaults.placeholders),
            standardize_columns: self.standardize_columns.unwrap_or(defaults.standardize_columns),
            title_map: self.title_map.unwrap_or(defaults.title_map),
            mode_columns: self.mode_columns.unwrap_or(defaults.mode_columns),
            drop_columns: self.drop_columns.unwrap_or(defaults.drop_columns),
            grouped_target: self.grouped_target.unwrap_or(defaults.grouped_target),
            group_key: self.group_key.unwrap_or(defaults.group_key),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            cleaned_file_name: defaults.cleaned_file_name,
            summary_file_name: defaults.summary_file_name,
            save_to_disk: self.save_to_disk.unwrap_or(defaults.save_to_disk),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for model training and premium derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelingConfig {
    /// Fraction of rows held out for testing (exclusive 0..1).
    /// Default: 0.3
    pub test_size: f64,

    /// Seed for splits, bootstrap samples and feature subsampling.
    /// Default: 42
    pub seed: u64,

    /// Multiplier applied to expected loss when pricing.
    /// Default: 1.2
    pub loading_factor: f64,

    /// Trees per random forest.
    /// Default: 100
    pub n_trees: usize,

    /// Maximum depth of random forest trees.
    /// Default: 12
    pub forest_max_depth: usize,

    /// Boosting rounds.
    /// Default: 100
    pub boosting_rounds: usize,

    /// Depth of each boosted tree.
    /// Default: 6
    pub boosting_max_depth: usize,

    /// Shrinkage applied to each boosted tree.
    /// Default: 0.3
    pub learning_rate: f64,

    /// Minimum rows in a node before it may split.
    /// Default: 2
    pub min_samples_split: usize,

    /// Gradient steps for logistic regression.
    /// Default: 500
    pub logistic_max_iter: usize,

    /// Identifier-like columns removed before encoding.
    pub high_cardinality_columns: Vec<String>,

    pub output_dir: PathBuf,
}

impl Default for ModelingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.3,
            seed: 42,
            loading_factor: 1.2,
            n_trees: 100,
            forest_max_depth: 12,
            boosting_rounds: 100,
            boosting_max_depth: 6,
            learning_rate: 0.3,
            min_samples_split: 2,
            logistic_max_iter: 500,
            high_cardinality_columns: to_strings(&DEFAULT_HIGH_CARDINALITY_COLUMNS),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl ModelingConfig {
    pub fn builder() -> ModelingConfigBuilder {
        ModelingConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "test_size".to_string(),
                value: self.test_size,
                range: "(0, 1)".to_string(),
            });
        }

        if !(self.loading_factor.is_finite() && self.loading_factor > 0.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "loading_factor".to_string(),
                value: self.loading_factor,
                range: "(0, inf)".to_string(),
            });
        }

        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "learning_rate".to_string(),
                value: self.learning_rate,
                range: "(0, 1]".to_string(),
            });
        }

        for (field, value) in [
            ("n_trees", self.n_trees),
            ("forest_max_depth", self.forest_max_depth),
            ("boosting_rounds", self.boosting_rounds),
            ("boosting_max_depth", self.boosting_max_depth),
            ("logistic_max_iter", self.logistic_max_iter),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::InvalidCount {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.min_samples_split < 2 {
            return Err(ConfigValidationError::InvalidCount {
                field: "min_samples_split".to_string(),
                value: self.min_samples_split,
            });
        }

        Ok(())
    }
}

/// Builder for [`ModelingConfig`].
#[derive(Debug, Default)]
pub struct ModelingConfigBuilder {
    test_size: Option<f64>,
    seed: Option<u64>,
    loading_factor: Option<f64>,
    n_trees: Option<usize>,
    boosting_rounds: Option<usize>,
    learning_rate: Option<f64>,
    output_dir: Option<PathBuf>,
}

impl ModelingConfigBuilder {
    pub fn test_size(mut self, test_size: f64) -> Self {
        self.test_size = Some(test_size);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn loading_factor(mut self, factor: f64) -> Self {
        self.loading_factor = Some(factor);
        self
    }

    /// Set the number of trees in each forest.
    pub fn n_trees(mut self, n: usize) -> Self {
        self.n_trees = Some(n);
        self
    }

    pub fn boosting_rounds(mut self, n: usize) -> Self {
        self.boosting_rounds = Some(n);
        self
    }

    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = Some(rate);
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ModelingConfig, ConfigValidationError> {
        let defaults = ModelingConfig::default();
        let config = ModelingConfig {
            test_size: self.test_size.unwrap_or(defaults.test_size),
            seed: self.seed.unwrap_or(defaults.seed),
            loading_factor: self.loading_factor.unwrap_or(defaults.loading_factor),
            n_trees: self.n_trees.unwrap_or(defaults.n_trees),
            boosting_rounds: self.boosting_rounds.unwrap_or(defaults.boosting_rounds),
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the hypothesis-test battery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisConfig {
    /// Significance level.
    /// Default: 0.05
    pub alpha: f64,

    pub output_dir: PathBuf,

    /// Default: "hypothesis_test_results.json"
    pub results_file_name: String,
}

impl Default for HypothesisConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            output_dir: PathBuf::from("output"),
            results_file_name: "hypothesis_test_results.json".to_string(),
        }
    }
}

impl HypothesisConfig {
    pub fn new(alpha: f64, output_dir: impl Into<PathBuf>) -> Result<Self, ConfigValidationError> {
        let config = Self {
            alpha,
            output_dir: output_dir.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(&self.results_file_name)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "alpha".to_string(),
                value: self.alpha,
                range: "(0, 1)".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.separator, b'|');
        assert_eq!(config.placeholders.len(), 5);
        assert!(config.placeholders.contains(&String::new()));
        assert_eq!(config.standardize_columns, vec!["Gender", "Bank", "AccountType"]);
        assert_eq!(config.mode_columns, vec!["Bank", "AccountType"]);
        assert_eq!(config.drop_columns.len(), 9);
        assert_eq!(config.grouped_target, "CustomValueEstimate");
        assert_eq!(config.group_key, "make");
        assert!(config.save_to_disk);
    }

    #[test]
    fn test_default_title_map() {
        let map = TitleGenderMap::default();
        assert_eq!(map.len(), 5);
        assert_eq!(map.lookup("Mr"), Some("Male"));
        assert_eq!(map.lookup("Miss"), Some("Female"));
        assert_eq!(map.lookup("Dr"), Some("Not specified"));
        assert_eq!(map.lookup("Prof"), None);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .separator(b',')
            .drop_columns(["PolicyID"])
            .title_map(TitleGenderMap::from_pairs([("Mx", "Not specified")]))
            .output_dir("metrics")
            .save_to_disk(false)
            .build()
            .unwrap();

        assert_eq!(config.separator, b',');
        assert_eq!(config.drop_columns, vec!["PolicyID"]);
        assert_eq!(config.title_map.lookup("Mx"), Some("Not specified"));
        assert_eq!(config.cleaned_path(), PathBuf::from("metrics/insurance_data_cleaned.csv"));
        assert!(!config.save_to_disk);
    }

    #[test]
    fn test_validation_zero_schema_length() {
        let result = PipelineConfig::builder().infer_schema_length(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidCount { .. }
        ));
    }

    #[test]
    fn test_modeling_defaults() {
        let config = ModelingConfig::builder().build().unwrap();
        assert_eq!(config.test_size, 0.3);
        assert_eq!(config.seed, 42);
        assert_eq!(config.loading_factor, 1.2);
        assert_eq!(config.logistic_max_iter, 500);
        assert_eq!(
            config.high_cardinality_columns,
            vec!["PolicyID", "PostalCode", "Model", "make"]
        );
    }

    #[test]
    fn test_modeling_validation() {
        assert!(matches!(
            ModelingConfig::builder().test_size(1.0).build().unwrap_err(),
            ConfigValidationError::OutOfRange { .. }
        ));
        assert!(ModelingConfig::builder().loading_factor(0.0).build().is_err());
        assert!(ModelingConfig::builder().loading_factor(f64::NAN).build().is_err());
        assert!(matches!(
            ModelingConfig::builder().n_trees(0).build().unwrap_err(),
            ConfigValidationError::InvalidCount { .. }
        ));
    }

    #[test]
    fn test_hypothesis_config() {
        let config = HypothesisConfig::default();
        assert_eq!(config.alpha, 0.05);
        assert!(HypothesisConfig::new(0.0, "out").is_err());
        let config = HypothesisConfig::new(0.01, "out").unwrap();
        assert_eq!(config.results_path(), PathBuf::from("out/hypothesis_test_results.json"));
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.placeholders, deserialized.placeholders);
        assert_eq!(config.title_map, deserialized.title_map);
    }
}
