//! Loading of raw and cleaned policy tables.

use crate::error::{Result, ResultExt, RiskError};
use crate::types::columns;
use crate::utils::{parse_numeric_string, require_column};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Columns coerced to f64 when the raw file has to be read as text.
pub const NUMERIC_COLUMNS: [&str; 3] = [
    columns::TOTAL_PREMIUM,
    columns::TOTAL_CLAIMS,
    columns::CUSTOM_VALUE_ESTIMATE,
];

/// Read a delimited policy file with a header row.
///
/// Schema inference runs over the first `infer_schema_length` rows. If that
/// fails (mixed values deep in the file), every column is re-read as text
/// and [`NUMERIC_COLUMNS`] are coerced, turning unparsable values into nulls.
pub fn load_raw_table(
    path: impl AsRef<Path>,
    separator: u8,
    infer_schema_length: usize,
) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RiskError::FileNotFound(path.display().to_string()));
    }

    info!("Loading raw policy data from: {}", path.display());

    match read_delimited(path, separator, Some(infer_schema_length)) {
        Ok(df) => {
            debug!("Loaded with inferred schema: {:?}", df.shape());
            Ok(df)
        }
        Err(e) => {
            warn!("Schema inference failed ({}), re-reading all columns as text", e);
            let df = read_delimited(path, separator, Some(0))
                .context(format!("Failed to read '{}'", path.display()))?;
            coerce_numeric_columns(df)
        }
    }
}

/// Read the comma-separated cleaned table written by the cleaning pipeline.
pub fn load_cleaned_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RiskError::FileNotFound(path.display().to_string()));
    }

    info!("Loading cleaned data from: {}", path.display());
    read_delimited(path, b',', Some(10_000)).context(format!("Failed to read '{}'", path.display()))
}

/// Fail with `ColumnNotFound` for the first absent column.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    for name in names {
        require_column(df, name)?;
    }
    Ok(())
}

fn read_delimited(
    path: &Path,
    separator: u8,
    infer_schema_length: Option<usize>,
) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(infer_schema_length)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"')),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
}

/// Parse known numeric columns that were read as text.
fn coerce_numeric_columns(mut df: DataFrame) -> Result<DataFrame> {
    for name in NUMERIC_COLUMNS {
        let Ok(column) = df.column(name) else {
            continue;
        };
        let series = column.as_materialized_series();
        if !matches!(series.dtype(), DataType::String) {
            continue;
        }

        let parsed: Vec<Option<f64>> = series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_numeric_string))
            .collect();
        let invalid = parsed.iter().filter(|v| v.is_none()).count() - series.null_count();
        if invalid > 0 {
            warn!("Column '{}': {} unparsable values set to missing", name, invalid);
        }

        df.replace(name, Series::new(name.into(), parsed))?;
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_raw_table_pipe_delimited() {
        let file = write_temp("PolicyID|Gender|TotalPremium\n1|Male|10.5\n2|Not specified|0\n");
        let df = load_raw_table(file.path(), b'|', 100).unwrap();

        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("TotalPremium").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_load_raw_table_missing_file() {
        let err = load_raw_table("does/not/exist.txt", b'|', 100).unwrap_err();
        assert!(matches!(err, RiskError::FileNotFound(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_coerce_numeric_columns() {
        let df = df![
            "TotalClaims" => [Some("1.5"), Some("bad"), None],
            "Gender" => ["Male", "Female", "Male"],
        ]
        .unwrap();

        let df = coerce_numeric_columns(df).unwrap();
        let claims: Vec<Option<f64>> = df
            .column("TotalClaims")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(claims, vec![Some(1.5), None, None]);
    }

    #[test]
    fn test_require_columns() {
        let df = df!["PolicyID" => [1i64], "Gender" => ["Male"]].unwrap();
        assert!(require_columns(&df, &["PolicyID", "Gender"]).is_ok());
        let err = require_columns(&df, &["PolicyID", "Title"]).unwrap_err();
        assert!(matches!(err, RiskError::ColumnNotFound(ref c) if c == "Title"));
    }
}
