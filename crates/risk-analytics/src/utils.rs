//! Shared utilities for the risk analytics pipeline.
//!
//! Column access helpers extract plain `Vec<Option<_>>` values from a
//! DataFrame so the row-wise cleaning and metric logic can be written as
//! pure functions, then rebuilt into a Series.

use crate::error::{Result, RiskError};
use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for encoding purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Try to parse a raw field as f64. Surrounding whitespace is ignored;
/// anything else that does not parse yields `None`.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Column Access
// =============================================================================

/// Fail with `ColumnNotFound` unless `name` is a column of `df`.
pub fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    if df.get_column_names().iter().any(|c| c.as_str() == name) {
        Ok(())
    } else {
        Err(RiskError::ColumnNotFound(name.to_string()))
    }
}

/// Check for a column without failing.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Column values rendered as strings (nulls preserved).
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    require_column(df, name)?;
    let series = df.column(name)?.as_materialized_series();
    let as_str = series.cast(&DataType::String)?;
    Ok(as_str
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Column values as f64. Values that cannot be represented become null.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    require_column(df, name)?;
    let series = df.column(name)?.as_materialized_series();
    let as_f64 = match series.dtype() {
        DataType::String => {
            let parsed: Vec<Option<f64>> = series
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_numeric_string))
                .collect();
            return Ok(parsed);
        }
        _ => series.cast(&DataType::Float64)?,
    };
    Ok(as_f64
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Column as a Float64 series; unparseable and NaN entries become null.
pub fn numeric_series(df: &DataFrame, name: &str) -> Result<Series> {
    Ok(Series::new(name.into(), numeric_values(df, name)?))
}

/// Total number of null cells in the frame.
pub fn total_null_count(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

// =============================================================================
// Statistics
// =============================================================================

/// Most frequent non-missing value. Ties go to the value seen first.
pub fn string_mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for val in values.iter().flatten() {
        let entry = counts.entry(val.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(val.as_str());
        }
        *entry += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for val in order {
        let count = counts[val];
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((val, count));
        }
    }
    best.map(|(val, _)| val.to_string())
}

/// Values ordered by descending frequency; ties keep first appearance.
pub fn value_counts(values: &[Option<String>]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for val in values.iter().flatten() {
        match index.get(val.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(val.as_str(), counts.len());
                counts.push((val.clone(), 1));
            }
        }
    }
    // stable sort keeps first-appearance order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null entries of a string column, returning the filled count.
pub fn fill_string_nulls(values: &mut [Option<String>], fill_value: &str) -> usize {
    let mut filled = 0;
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(fill_value.to_string());
        filled += 1;
    }
    filled
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int32), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Other);
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string(" 21.5 "), Some(21.5));
        assert_eq!(parse_numeric_string("-100"), Some(-100.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("n/a"), None);
    }

    #[test]
    fn test_numeric_series_parses_text() {
        let df =
            df!["CustomValueEstimate" => [Some("100"), Some("n/a"), None, Some("300")]].unwrap();
        let series = numeric_series(&df, "CustomValueEstimate").unwrap();

        assert_eq!(series.dtype(), &DataType::Float64);
        assert_eq!(series.null_count(), 2);
        assert_eq!(series.median(), Some(200.0));
    }

    #[test]
    fn test_string_mode() {
        let values = owned(&[Some("a"), Some("b"), Some("a"), None, Some("c"), Some("a")]);
        assert_eq!(string_mode(&values), Some("a".to_string()));
    }

    #[test]
    fn test_string_mode_tie_is_first_encountered() {
        let values = owned(&[None, Some("b"), Some("a"), Some("a"), Some("b")]);
        assert_eq!(string_mode(&values), Some("b".to_string()));
        assert_eq!(string_mode(&owned(&[None, None])), None);
    }

    #[test]
    fn test_value_counts_order() {
        let values = owned(&[Some("x"), Some("y"), Some("y"), Some("z"), Some("x"), Some("w")]);
        let counts = value_counts(&values);
        assert_eq!(counts[0], ("x".to_string(), 2));
        assert_eq!(counts[1], ("y".to_string(), 2));
        assert_eq!(counts.len(), 4);
    }

    #[test]
    fn test_fill_nulls() {
        let mut strings = owned(&[Some("a"), None, None]);
        assert_eq!(fill_string_nulls(&mut strings, "Missing"), 2);
        assert_eq!(strings[2].as_deref(), Some("Missing"));
    }

    #[test]
    fn test_column_access() {
        let df = df![
            "a" => [Some("1.5"), None, Some("x")],
            "b" => [1i64, 2, 3],
        ]
        .unwrap();

        assert_eq!(numeric_values(&df, "a").unwrap(), vec![Some(1.5), None, None]);
        assert_eq!(numeric_values(&df, "b").unwrap(), vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(string_values(&df, "b").unwrap()[0].as_deref(), Some("1"));
        assert_eq!(total_null_count(&df), 1);
        assert!(matches!(
            require_column(&df, "missing").unwrap_err(),
            RiskError::ColumnNotFound(_)
        ));
    }
}
