//! Group-median imputation for numeric columns.

use crate::error::{Result, ResultExt, RiskError};
use crate::utils::{numeric_series, require_column, string_values};
use polars::prelude::*;
use tracing::debug;

const GROUP_MEDIAN: &str = "__group_median";

/// Counts from a grouped fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupedFill {
    /// Cells filled with their group's median.
    pub from_group: usize,
    /// Cells filled with the global median.
    pub from_global: usize,
}

impl GroupedFill {
    pub fn total(&self) -> usize {
        self.from_group + self.from_global
    }
}

/// Fill missing `target` values with the median of their `key` group, then
/// with the global median for anything still missing.
///
/// Rows with a missing key never receive a group median. The target column
/// is rewritten as f64. Fails with `NoValidValues` if the whole target is
/// missing.
pub fn impute_grouped_median(
    df: &mut DataFrame,
    target: &str,
    key: &str,
) -> Result<GroupedFill> {
    require_column(df, target).context("Grouped median imputation")?;
    require_column(df, key).context("Grouped median imputation")?;

    let values = numeric_series(df, target)?;
    let keys = Series::new(key.into(), string_values(df, key)?);

    let global = values
        .median()
        .ok_or_else(|| RiskError::NoValidValues(target.to_string()))?;

    let medians = DataFrame::new(vec![values.clone().into(), keys.clone().into()])?
        .lazy()
        .select([col(target).median().over([col(key)]).alias(GROUP_MEDIAN)])
        .collect()?;

    let mut fill = GroupedFill::default();
    let filled: Float64Chunked = values
        .f64()?
        .into_iter()
        .zip(medians.column(GROUP_MEDIAN)?.f64()?.into_iter())
        .zip(keys.str()?.into_iter())
        .map(|((value, group), k)| match (value, group) {
            (Some(v), _) => Some(v),
            // null keys share a window group but never get a group median
            (None, Some(m)) if k.is_some() => {
                fill.from_group += 1;
                Some(m)
            }
            (None, _) => {
                fill.from_global += 1;
                Some(global)
            }
        })
        .collect();

    df.replace(target, filled.with_name(target.into()).into_series())?;
    debug!(
        "Column '{}': {} filled from '{}' medians, {} from global median {:.4}",
        target, fill.from_group, key, fill.from_global, global
    );
    Ok(fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::numeric_values;

    #[test]
    fn test_grouped_median_then_global() {
        // A: [10, 20] -> 15; B: all missing; global median of [10, 20, 100] = 20
        let mut df = df![
            "CustomValueEstimate" => [Some(10.0), Some(20.0), None, None, Some(100.0), None],
            "make" => [Some("A"), Some("A"), Some("A"), Some("B"), Some("C"), None],
        ]
        .unwrap();

        let fill = impute_grouped_median(&mut df, "CustomValueEstimate", "make").unwrap();
        let values = numeric_values(&df, "CustomValueEstimate").unwrap();

        assert_eq!(fill, GroupedFill { from_group: 1, from_global: 2 });
        assert_eq!(fill.total(), 3);
        assert_eq!(values[2], Some(15.0));
        assert_eq!(values[3], Some(20.0));
        assert_eq!(values[5], Some(20.0));
        assert_eq!(df.column("CustomValueEstimate").unwrap().null_count(), 0);
    }

    #[test]
    fn test_grouped_median_all_missing() {
        let mut df = df![
            "CustomValueEstimate" => [None::<f64>, None],
            "make" => ["A", "B"],
        ]
        .unwrap();

        let err = impute_grouped_median(&mut df, "CustomValueEstimate", "make").unwrap_err();
        assert!(matches!(err, RiskError::NoValidValues(_)));
    }

    #[test]
    fn test_grouped_median_absent_key() {
        let mut df = df!["CustomValueEstimate" => [Some(1.0)]].unwrap();
        let err = impute_grouped_median(&mut df, "CustomValueEstimate", "make").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}
