//! Gender inference from honorific titles.

use crate::config::TitleGenderMap;
use crate::error::{Result, ResultExt};
use crate::types::columns;
use crate::utils::{require_column, string_values};
use polars::prelude::*;
use tracing::debug;

/// Gender for one row: the recorded value, or the title lookup when missing.
pub fn infer_gender(
    gender: Option<&str>,
    title: Option<&str>,
    map: &TitleGenderMap,
) -> Option<String> {
    match gender {
        Some(g) => Some(g.to_string()),
        None => title.and_then(|t| map.lookup(t)).map(str::to_string),
    }
}

/// Fill missing `Gender` values from `Title` through the injected table.
///
/// Rows whose title is missing or unmapped keep a missing Gender. Both
/// columns must exist. Returns the number of filled cells.
pub fn impute_gender(df: &mut DataFrame, map: &TitleGenderMap) -> Result<usize> {
    require_column(df, columns::GENDER).context("Gender imputation")?;
    require_column(df, columns::TITLE).context("Gender imputation")?;

    let genders = string_values(df, columns::GENDER)?;
    let titles = string_values(df, columns::TITLE)?;

    let mut filled = 0;
    let imputed: Vec<Option<String>> = genders
        .iter()
        .zip(titles.iter())
        .map(|(g, t)| {
            let value = infer_gender(g.as_deref(), t.as_deref(), map);
            if g.is_none() && value.is_some() {
                filled += 1;
            }
            value
        })
        .collect();

    df.replace(columns::GENDER, Series::new(columns::GENDER.into(), imputed))?;
    debug!("Inferred {} Gender values from Title", filled);
    Ok(filled)
}
