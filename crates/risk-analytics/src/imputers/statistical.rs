//! Statistical imputation methods.
//!
//! Provides median, mode and constant imputation for single columns.

use crate::error::{Result, RiskError};
use crate::utils::{fill_string_nulls, numeric_series, string_mode, string_values};
use polars::prelude::*;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill missing values with the column median. The column becomes f64.
    ///
    /// Returns the number of filled cells.
    pub fn apply_numeric_median(
        df: &mut DataFrame,
        col_name: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<usize> {
        let series = numeric_series(df, col_name)?;
        let median_val = series
            .median()
            .ok_or_else(|| RiskError::NoValidValues(col_name.to_string()))?;

        let filled = series.null_count();
        let filled_series = series.f64()?.fill_null_with_values(median_val)?.into_series();
        df.replace(col_name, filled_series)?;

        processing_steps.push(format!(
            "Filled {} missing values in '{}' with median: {:.4}",
            filled, col_name, median_val
        ));
        Ok(filled)
    }

    /// Fill missing values with the most frequent value.
    ///
    /// Ties go to the value encountered first in row order. A column with no
    /// non-missing value fails with `NoValidValues`.
    pub fn apply_mode_imputation(
        df: &mut DataFrame,
        col_name: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<usize> {
        let mut values = string_values(df, col_name)?;
        let mode_val =
            string_mode(&values).ok_or_else(|| RiskError::NoValidValues(col_name.to_string()))?;

        let filled = fill_string_nulls(&mut values, &mode_val);
        if filled > 0 {
            df.replace(col_name, Series::new(col_name.into(), values))?;
        }

        processing_steps.push(format!(
            "Filled {} missing values in '{}' with mode: '{}'",
            filled, col_name, mode_val
        ));
        Ok(filled)
    }

    /// Fill missing values with a constant category.
    pub fn apply_constant_imputation(
        df: &mut DataFrame,
        col_name: &str,
        constant: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<usize> {
        let mut values = string_values(df, col_name)?;
        let filled = fill_string_nulls(&mut values, constant);
        if filled > 0 {
            df.replace(col_name, Series::new(col_name.into(), values))?;
            processing_steps.push(format!(
                "Filled {} missing values in '{}' with constant value: '{}'",
                filled, col_name, constant
            ));
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::numeric_values;

    fn strings(df: &DataFrame, col: &str) -> Vec<Option<String>> {
        string_values(df, col).unwrap()
    }

    #[test]
    fn test_apply_numeric_median_basic() {
        let mut df = df!["value" => [Some(1.0), None, Some(3.0), Some(10.0)]].unwrap();
        let mut steps = Vec::new();

        let filled =
            StatisticalImputer::apply_numeric_median(&mut df, "value", &mut steps).unwrap();

        assert_eq!(filled, 1);
        assert_eq!(numeric_values(&df, "value").unwrap()[1], Some(3.0));
        assert!(steps[0].contains("median"));
    }

    #[test]
    fn test_apply_numeric_median_all_nulls() {
        let mut df = df!["value" => [None::<f64>, None]].unwrap();
        let err = StatisticalImputer::apply_numeric_median(&mut df, "value", &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, RiskError::NoValidValues(_)));
    }

    #[test]
    fn test_apply_mode_imputation_basic() {
        let mut df = df!["Bank" => [Some("FNB"), None, Some("ABSA"), Some("FNB"), None]].unwrap();
        let mut steps = Vec::new();

        let filled =
            StatisticalImputer::apply_mode_imputation(&mut df, "Bank", &mut steps).unwrap();

        assert_eq!(filled, 2);
        assert_eq!(df.column("Bank").unwrap().null_count(), 0);
        assert_eq!(strings(&df, "Bank")[1].as_deref(), Some("FNB"));
    }

    #[test]
    fn test_apply_mode_imputation_tie_breaking() {
        let mut df = df![
            "AccountType" => [
                None,
                Some("Savings"),
                Some("Current"),
                Some("Current"),
                Some("Savings"),
            ],
        ]
        .unwrap();
        StatisticalImputer::apply_mode_imputation(&mut df, "AccountType", &mut Vec::new()).unwrap();
        assert_eq!(strings(&df, "AccountType")[0].as_deref(), Some("Savings"));
    }

    #[test]
    fn test_apply_mode_imputation_all_missing() {
        let mut df = df!["Bank" => [None::<&str>, None]].unwrap();
        let err = StatisticalImputer::apply_mode_imputation(&mut df, "Bank", &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, RiskError::NoValidValues(ref c) if c == "Bank"));
        assert!(err.is_degenerate_data());
    }

    #[test]
    fn test_apply_mode_imputation_absent_column() {
        let mut df = df!["Bank" => ["FNB"]].unwrap();
        let err =
            StatisticalImputer::apply_mode_imputation(&mut df, "AccountType", &mut Vec::new())
                .unwrap_err();
        assert!(matches!(err, RiskError::ColumnNotFound(_)));
    }

    #[test]
    fn test_apply_constant_imputation_basic() {
        let mut df = df!["make" => [Some("TOYOTA"), None]].unwrap();
        let mut steps = Vec::new();
        let filled =
            StatisticalImputer::apply_constant_imputation(&mut df, "make", "Missing", &mut steps)
                .unwrap();
        assert_eq!(filled, 1);
        assert_eq!(strings(&df, "make")[1].as_deref(), Some("Missing"));
        assert_eq!(steps.len(), 1);
    }
}
