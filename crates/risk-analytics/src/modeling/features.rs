//! Feature preparation for the claim models.
//!
//! Categorical columns are one-hot encoded into `<column>_<value>` indicator
//! columns with levels in order of appearance, numeric columns pass through
//! as f64 and booleans become 0/1.

use crate::error::{Result, ResultExt, RiskError};
use crate::imputers::StatisticalImputer;
use crate::types::columns;
use crate::utils::{
    DtypeCategory, get_dtype_category, numeric_series, numeric_values, require_column,
    string_values,
};
use ndarray::{Array2, Axis};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Fill value for missing categorical entries before encoding.
pub const MISSING_CATEGORY: &str = "Missing";

/// Columns computed from the claims amount. They would reveal the target of
/// either model and are never used as features.
pub const DERIVED_CLAIM_COLUMNS: [&str; 6] = [
    columns::LOSS_RATIO,
    columns::CLAIM_OCCURRED,
    columns::CLAIM_FREQUENCY,
    columns::CLAIM_SEVERITY,
    columns::MARGIN,
    columns::HAS_CLAIM,
];

/// Encoded features with their column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Rows at the given positions, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// The first `n` rows (all rows if fewer).
    pub fn head(&self, n: usize) -> FeatureMatrix {
        let n = n.min(self.n_rows());
        let indices: Vec<usize> = (0..n).collect();
        self.select_rows(&indices)
    }
}

/// Fill every missing value before modeling: numeric columns get their
/// median, all other columns the `"Missing"` category.
///
/// Numeric columns without a single value are dropped. Returns the
/// processing steps taken.
pub fn clean_and_impute(df: &mut DataFrame) -> Result<Vec<String>> {
    let mut steps = Vec::new();
    let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();

    for name in &names {
        let column = df.column(name)?;
        let nulls = column.null_count();
        if nulls == 0 {
            continue;
        }

        match get_dtype_category(column.dtype()) {
            DtypeCategory::Numeric if nulls == df.height() => {
                warn!("Column '{}' has no values, dropping it", name);
                *df = df.drop(name)?;
                steps.push(format!("Dropped empty numeric column '{}'", name));
            }
            DtypeCategory::Numeric => {
                StatisticalImputer::apply_numeric_median(df, name, &mut steps)?;
            }
            _ => {
                StatisticalImputer::apply_constant_imputation(
                    df,
                    name,
                    MISSING_CATEGORY,
                    &mut steps,
                )?;
            }
        }
    }

    debug!("Pre-model imputation: {} steps", steps.len());
    Ok(steps)
}

/// One-hot encoder producing a dense feature matrix.
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    high_cardinality: Vec<String>,
    excluded: Vec<String>,
}

impl FeatureEncoder {
    /// Encoder dropping the given identifier-like columns.
    pub fn new(high_cardinality: &[String]) -> Self {
        Self {
            high_cardinality: high_cardinality.to_vec(),
            excluded: Vec::new(),
        }
    }

    /// Also leave out these columns.
    pub fn excluding<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.excluded.extend(cols.into_iter().map(Into::into));
        self
    }

    /// Encode every column except the target, the high-cardinality columns
    /// and the excluded ones. Absent columns in either list are ignored.
    pub fn encode(&self, df: &DataFrame, target: &str) -> Result<FeatureMatrix> {
        require_column(df, target).context("Feature encoding")?;

        let mut names: Vec<String> = Vec::new();
        let mut feature_columns: Vec<Vec<f64>> = Vec::new();

        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == target
                || self.high_cardinality.iter().any(|c| c == name)
                || self.excluded.iter().any(|c| c == name)
            {
                continue;
            }

            match get_dtype_category(column.dtype()) {
                DtypeCategory::Numeric | DtypeCategory::Boolean => {
                    let series = numeric_series(df, name)?;
                    let fill = series.median().unwrap_or(0.0);
                    names.push(name.to_string());
                    feature_columns
                        .push(series.f64()?.into_iter().map(|v| v.unwrap_or(fill)).collect());
                }
                DtypeCategory::String | DtypeCategory::Other => {
                    let values = string_values(df, name)?;
                    let (level_names, indicators) = one_hot(name, &values);
                    names.extend(level_names);
                    feature_columns.extend(indicators);
                }
            }
        }

        if feature_columns.is_empty() {
            return Err(RiskError::InvalidInput(format!(
                "no feature columns left after removing '{target}' and excluded columns"
            )));
        }

        let n_rows = df.height();
        let values = Array2::from_shape_fn((n_rows, feature_columns.len()), |(i, j)| {
            feature_columns[j][i]
        });
        debug!("Encoded {} rows into {} features", n_rows, names.len());

        Ok(FeatureMatrix { names, values })
    }
}

/// Indicator columns for each level in order of appearance; missing values
/// get their own `<column>_nan` level.
fn one_hot(name: &str, values: &[Option<String>]) -> (Vec<String>, Vec<Vec<f64>>) {
    let mut level_index: HashMap<&str, usize> = HashMap::new();
    let mut levels: Vec<&str> = Vec::new();
    let codes: Vec<usize> = values
        .iter()
        .map(|v| {
            let level = v.as_deref().unwrap_or("nan");
            *level_index.entry(level).or_insert_with(|| {
                levels.push(level);
                levels.len() - 1
            })
        })
        .collect();

    let mut indicators = vec![vec![0.0; values.len()]; levels.len()];
    for (row, code) in codes.into_iter().enumerate() {
        indicators[code][row] = 1.0;
    }

    let names = levels.iter().map(|level| format!("{name}_{level}")).collect();
    (names, indicators)
}

/// Severity training data: policies with a claim, target `TotalClaims`.
pub fn prepare_severity_data(
    df: &DataFrame,
    high_cardinality: &[String],
) -> Result<(FeatureMatrix, Vec<f64>)> {
    let claims = numeric_values(df, columns::TOTAL_CLAIMS).context("Severity data")?;
    let mask: Vec<bool> = claims.iter().map(|c| c.is_some_and(|c| c > 0.0)).collect();
    let found = mask.iter().filter(|m| **m).count();
    if found < 2 {
        return Err(RiskError::InsufficientObservations {
            group: "TotalClaims > 0".to_string(),
            found,
            required: 2,
        });
    }

    let with_claims = df.filter(&BooleanChunked::from_slice("has_claim".into(), &mask))?;
    let x = FeatureEncoder::new(high_cardinality)
        .excluding(DERIVED_CLAIM_COLUMNS)
        .encode(&with_claims, columns::TOTAL_CLAIMS)?;
    let y: Vec<f64> = numeric_values(&with_claims, columns::TOTAL_CLAIMS)?
        .into_iter()
        .flatten()
        .collect();

    info!("Severity data: {} policies with claims, {} features", y.len(), x.n_features());
    Ok((x, y))
}

/// Claim-occurrence data: every policy, target `HasClaim` (claims > 0).
pub fn prepare_classification_data(
    df: &DataFrame,
    high_cardinality: &[String],
) -> Result<(FeatureMatrix, Vec<bool>)> {
    let claims = numeric_values(df, columns::TOTAL_CLAIMS).context("Classification data")?;
    let y: Vec<bool> = claims.iter().map(|c| c.is_some_and(|c| c > 0.0)).collect();

    let mut labelled = df.clone();
    labelled.with_column(Series::new(columns::HAS_CLAIM.into(), y.clone()))?;

    let x = FeatureEncoder::new(high_cardinality)
        .excluding(DERIVED_CLAIM_COLUMNS)
        .excluding([columns::TOTAL_CLAIMS])
        .encode(&labelled, columns::HAS_CLAIM)?;

    info!(
        "Classification data: {} policies ({} with claims), {} features",
        y.len(),
        y.iter().filter(|c| **c).count(),
        x.n_features()
    );
    Ok((x, y))
}
