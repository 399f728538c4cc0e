//! Imputation module for handling missing values.
//!
//! This module provides:
//! - Gender inference from titles
//! - Statistical imputation (median, mode, constant)
//! - Group-median imputation with a global fallback

mod gender;
mod grouped;
mod statistical;

pub use gender::{impute_gender, infer_gender};
pub use grouped::{GroupedFill, impute_grouped_median};
pub use statistical::StatisticalImputer;
