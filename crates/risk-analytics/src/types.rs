use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column names used throughout the pipeline.
pub mod columns {
    pub const POLICY_ID: &str = "PolicyID";
    pub const POSTAL_CODE: &str = "PostalCode";
    pub const PROVINCE: &str = "Province";
    pub const GENDER: &str = "Gender";
    pub const TITLE: &str = "Title";
    pub const BANK: &str = "Bank";
    pub const ACCOUNT_TYPE: &str = "AccountType";
    pub const MAKE: &str = "make";
    pub const MODEL: &str = "Model";
    pub const CUSTOM_VALUE_ESTIMATE: &str = "CustomValueEstimate";
    pub const TOTAL_PREMIUM: &str = "TotalPremium";
    pub const TOTAL_CLAIMS: &str = "TotalClaims";
    pub const WRITTEN_OFF: &str = "WrittenOff";

    // derived
    pub const LOSS_RATIO: &str = "LossRatio";
    pub const CLAIM_OCCURRED: &str = "ClaimOccurred";
    pub const CLAIM_FREQUENCY: &str = "ClaimFrequency";
    pub const CLAIM_SEVERITY: &str = "ClaimSeverity";
    pub const MARGIN: &str = "Margin";
    pub const HAS_CLAIM: &str = "HasClaim";

    /// Columns the raw policy file must carry.
    pub const REQUIRED_RAW: [&str; 13] = [
        POLICY_ID,
        POSTAL_CODE,
        PROVINCE,
        GENDER,
        TITLE,
        BANK,
        ACCOUNT_TYPE,
        MAKE,
        MODEL,
        CUSTOM_VALUE_ESTIMATE,
        TOTAL_PREMIUM,
        TOTAL_CLAIMS,
        WRITTEN_OFF,
    ];
}

/// Dataset-level metrics written next to the cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub rows: usize,
    pub columns: usize,
    pub missing_values: usize,
    pub mean_loss_ratio: f64,
    /// Share of rows whose WrittenOff flag equals "Yes".
    pub writtenoff_ratio: f64,
}

// ============================================================================
// Cleaning Summary Types
// ============================================================================

/// Human-readable summary of what the cleaning pipeline did.
///
/// Returned inside [`PipelineResult`] and printed by the CLI under `--json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    pub rows_before: usize,
    pub rows_after: usize,

    pub columns_before: usize,
    pub columns_after: usize,

    /// Missing cells before placeholder standardization.
    pub missing_before: usize,
    /// Missing cells in the final table.
    pub missing_after: usize,

    /// Columns removed by the pruner, in drop-list order.
    pub dropped_columns: Vec<String>,

    /// List of actions taken during cleaning.
    pub actions: Vec<CleaningAction>,

    /// Number of cells filled per column.
    pub imputed_counts: BTreeMap<String, usize>,

    pub warnings: Vec<String>,
}

impl CleaningSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the summary.
    pub fn add_action(&mut self, action: CleaningAction) {
        self.actions.push(action);
    }

    /// Add a warning to the summary.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Accumulate filled cells for a column.
    pub fn record_imputed(&mut self, column: impl Into<String>, count: usize) {
        *self.imputed_counts.entry(column.into()).or_insert(0) += count;
    }

    /// Total number of cells filled across all columns.
    pub fn total_imputed(&self) -> usize {
        self.imputed_counts.values().sum()
    }

    /// Calculate the percentage of columns removed.
    pub fn columns_removed_percentage(&self) -> f32 {
        if self.columns_before == 0 {
            0.0
        } else {
            (self.dropped_columns.len() as f32 / self.columns_before as f32) * 100.0
        }
    }
}

/// A single action taken during cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningAction {
    pub action_type: ActionType,
    /// Target of the action (column name or "dataset").
    pub target: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CleaningAction {
    /// Create a new cleaning action.
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Add details to the action.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Types of actions that can be taken during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Placeholder strings were replaced by missing markers.
    ValueStandardized,
    /// Missing values were imputed.
    ValueImputed,
    /// A column was removed from the dataset.
    ColumnRemoved,
    /// A derived metric column was attached.
    MetricDerived,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ValueStandardized => "Value Standardized",
            Self::ValueImputed => "Value Imputed",
            Self::ColumnRemoved => "Column Removed",
            Self::MetricDerived => "Metric Derived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub cleaned_data: Option<String>,
    pub metrics_file: Option<String>,
    pub processing_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CleaningSummary>,
}

// ============================================================================
// Hypothesis Test Types
// ============================================================================

/// Outcome of one hypothesis test. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum HypothesisTestResult {
    /// Welch two-sample t-test on a metric between two groups.
    TTest {
        metric: String,
        group_col: String,
        group_a: String,
        group_b: String,
        n_a: usize,
        n_b: usize,
        t_stat: f64,
        df: f64,
        p_value: f64,
        significant: bool,
    },
    /// Chi-squared test of independence between two categorical columns.
    ChiSquared {
        group_col: String,
        target_col: String,
        chi2: f64,
        dof: usize,
        p_value: f64,
        significant: bool,
    },
}

impl HypothesisTestResult {
    pub fn p_value(&self) -> f64 {
        match self {
            Self::TTest { p_value, .. } | Self::ChiSquared { p_value, .. } => *p_value,
        }
    }

    pub fn is_significant(&self) -> bool {
        match self {
            Self::TTest { significant, .. } | Self::ChiSquared { significant, .. } => *significant,
        }
    }

    /// One-line description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::TTest {
                metric,
                group_col,
                group_a,
                group_b,
                t_stat,
                p_value,
                ..
            } => format!(
                "{metric} by {group_col} ({group_a} vs {group_b}): t={t_stat:.4}, p={p_value:.4}"
            ),
            Self::ChiSquared {
                group_col,
                target_col,
                chi2,
                p_value,
                ..
            } => format!("{group_col} x {target_col}: chi2={chi2:.4}, p={p_value:.4}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
