//! Placeholder standardization for categorical columns.

use crate::error::{Result, ResultExt};
use crate::utils::require_column;
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Replace placeholder strings with nulls in each listed column.
///
/// Matching is exact: `" Unknown"` is not a placeholder. Every listed column
/// must exist; unlisted columns are never touched. Non-text columns cannot
/// hold placeholders and are left as they are. Returns the number of cells
/// replaced per column.
pub fn standardize_missing_values(
    df: &mut DataFrame,
    cols: &[String],
    placeholders: &[String],
) -> Result<BTreeMap<String, usize>> {
    for col in cols {
        require_column(df, col).context("Missing-value standardization")?;
    }

    let patterns: HashSet<&str> = placeholders.iter().map(String::as_str).collect();
    let mut replaced = BTreeMap::new();

    for col_name in cols {
        let series = df.column(col_name)?.as_materialized_series();
        if series.dtype() != &DataType::String {
            replaced.insert(col_name.clone(), 0);
            continue;
        }

        let (cleaned_series, count) = replace_placeholders_with_null(series, &patterns)?;
        if count > 0 {
            df.replace(col_name, cleaned_series)?;
        }
        debug!("Column '{}': {} placeholder values set to missing", col_name, count);
        replaced.insert(col_name.clone(), count);
    }

    Ok(replaced)
}

/// Replace exact placeholder matches with null values.
pub(crate) fn replace_placeholders_with_null(
    series: &Series,
    patterns: &HashSet<&str>,
) -> Result<(Series, usize)> {
    let str_series = series.str()?;
    let mut cleaned_values = Vec::with_capacity(str_series.len());
    let mut replacement_count = 0;

    for opt_val in str_series.into_iter() {
        match opt_val {
            Some(val) if patterns.contains(val) => {
                cleaned_values.push(None);
                replacement_count += 1;
            }
            other => cleaned_values.push(other.map(str::to_string)),
        }
    }

    Ok((
        Series::new(series.name().clone(), cleaned_values),
        replacement_count,
    ))
}
