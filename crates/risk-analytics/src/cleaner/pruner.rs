//! Best-effort column removal.

use polars::prelude::*;
use tracing::info;

/// Drop the listed columns that are present, skipping the rest.
///
/// Idempotent: a second call with the same list drops nothing. Returns the
/// columns actually removed, in list order.
pub fn prune_columns(df: &mut DataFrame, cols_to_drop: &[String]) -> Vec<String> {
    let present: Vec<String> = cols_to_drop
        .iter()
        .filter(|c| df.get_column_names().iter().any(|n| n.as_str() == c.as_str()))
        .cloned()
        .collect();

    if !present.is_empty() {
        let cols_ref: Vec<PlSmallStr> = present.iter().map(|s| s.as_str().into()).collect();
        *df = df.drop_many(cols_ref);
    }

    info!("Dropped columns: {:?}", present);
    present
}
