//! Data cleaning module for raw policy tables.
//!
//! This module provides:
//! - Placeholder standardization (fail-fast: every listed column must exist)
//! - Column pruning (best-effort: absent columns are skipped)

mod pruner;
mod sanitizers;

pub use pruner::prune_columns;
pub use sanitizers::standardize_missing_values;
