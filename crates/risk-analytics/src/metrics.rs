//! Derived actuarial metrics.
//!
//! The column functions are pure and work on plain slices; the `attach_*`
//! functions read the inputs from a DataFrame and add (or replace) the
//! derived columns, so recomputing never duplicates a column.

use crate::error::{Result, ResultExt};
use crate::types::{MetricsSummary, columns};
use crate::utils::{numeric_values, require_column, string_values, total_null_count};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Claims over premium, or 1 when the premium is zero.
///
/// A missing premium or missing claims amount yields a missing ratio.
pub fn loss_ratio(claims: &[Option<f64>], premium: &[Option<f64>]) -> Vec<Option<f64>> {
    claims
        .iter()
        .zip(premium.iter())
        .map(|(c, p)| match (c, p) {
            (_, Some(p)) if *p == 0.0 => Some(1.0),
            (Some(c), Some(p)) => Some(c / p),
            _ => None,
        })
        .collect()
}

/// Whether any claim was paid. Missing claims count as no claim.
pub fn claim_occurred(claims: &[Option<f64>]) -> Vec<bool> {
    claims.iter().map(|c| c.is_some_and(|c| c > 0.0)).collect()
}

/// 1 for every row of a policy that had a claim in any period, else 0.
///
/// Rows with a missing policy key are treated as their own policy.
pub fn claim_frequency(policy_ids: &[Option<String>], occurred: &[bool]) -> Vec<i32> {
    let mut any_claim: HashMap<&str, bool> = HashMap::new();
    for (id, occ) in policy_ids.iter().zip(occurred.iter()) {
        if let Some(id) = id {
            let entry = any_claim.entry(id.as_str()).or_insert(false);
            *entry |= *occ;
        }
    }

    policy_ids
        .iter()
        .zip(occurred.iter())
        .map(|(id, occ)| {
            let flag = match id {
                Some(id) => any_claim.get(id.as_str()).copied().unwrap_or(*occ),
                None => *occ,
            };
            i32::from(flag)
        })
        .collect()
}

/// Claim amount where a claim occurred, else 0.
pub fn claim_severity(claims: &[Option<f64>], occurred: &[bool]) -> Vec<f64> {
    claims
        .iter()
        .zip(occurred.iter())
        .map(|(c, occ)| if *occ { c.unwrap_or(0.0) } else { 0.0 })
        .collect()
}

/// Premium minus claims; missing when either side is missing.
pub fn margin(premium: &[Option<f64>], claims: &[Option<f64>]) -> Vec<Option<f64>> {
    premium
        .iter()
        .zip(claims.iter())
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) => Some(p - c),
            _ => None,
        })
        .collect()
}

/// Add or replace the `LossRatio` column.
pub fn attach_loss_ratio(df: &mut DataFrame) -> Result<()> {
    let claims = numeric_values(df, columns::TOTAL_CLAIMS).context("Loss ratio")?;
    let premium = numeric_values(df, columns::TOTAL_PREMIUM).context("Loss ratio")?;

    let ratios = loss_ratio(&claims, &premium);
    let missing = ratios.iter().filter(|r| r.is_none()).count();
    if missing > 0 {
        warn!("{} rows have a missing LossRatio (missing premium or claims)", missing);
    }

    df.with_column(Series::new(columns::LOSS_RATIO.into(), ratios))?;
    Ok(())
}

/// Add or replace ClaimOccurred, ClaimFrequency, ClaimSeverity and Margin,
/// grouping claim frequency by `policy_key`.
pub fn attach_claim_metrics(df: &mut DataFrame, policy_key: &str) -> Result<()> {
    require_column(df, policy_key).context("Claim metrics")?;
    let policy_ids = string_values(df, policy_key)?;
    attach_claim_columns(df, &policy_ids)
}

/// Like [`attach_claim_metrics`] but every row is its own policy, for
/// tables whose policy key has been pruned.
pub fn attach_claim_metrics_per_row(df: &mut DataFrame) -> Result<()> {
    let row_ids: Vec<Option<String>> = (0..df.height()).map(|i| Some(i.to_string())).collect();
    attach_claim_columns(df, &row_ids)
}

fn attach_claim_columns(df: &mut DataFrame, policy_ids: &[Option<String>]) -> Result<()> {
    let claims = numeric_values(df, columns::TOTAL_CLAIMS).context("Claim metrics")?;
    let premium = numeric_values(df, columns::TOTAL_PREMIUM).context("Claim metrics")?;

    let occurred = claim_occurred(&claims);
    let frequency = claim_frequency(policy_ids, &occurred);
    let severity = claim_severity(&claims, &occurred);
    let margins = margin(&premium, &claims);

    debug!(
        "Claim metrics: {} of {} rows with a claim",
        occurred.iter().filter(|o| **o).count(),
        occurred.len()
    );

    df.with_column(Series::new(columns::CLAIM_OCCURRED.into(), occurred))?;
    df.with_column(Series::new(columns::CLAIM_FREQUENCY.into(), frequency))?;
    df.with_column(Series::new(columns::CLAIM_SEVERITY.into(), severity))?;
    df.with_column(Series::new(columns::MARGIN.into(), margins))?;
    Ok(())
}

/// Dataset-level summary of a cleaned table carrying `LossRatio`.
pub fn compute_metrics_summary(df: &DataFrame) -> Result<MetricsSummary> {
    let ratios = numeric_values(df, columns::LOSS_RATIO).context("Metrics summary")?;
    let written_off = string_values(df, columns::WRITTEN_OFF).context("Metrics summary")?;

    let present: Vec<f64> = ratios.iter().flatten().copied().collect();
    let mean_loss_ratio = if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    };

    let writtenoff_ratio = if written_off.is_empty() {
        0.0
    } else {
        written_off.iter().filter(|v| v.as_deref() == Some("Yes")).count() as f64
            / written_off.len() as f64
    };

    Ok(MetricsSummary {
        rows: df.height(),
        columns: df.width(),
        missing_values: total_null_count(df),
        mean_loss_ratio,
        writtenoff_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ids(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn test_loss_ratio_zero_premium_is_one() {
        let ratios = loss_ratio(
            &[Some(50.0), Some(0.0), Some(30.0), None],
            &[Some(0.0), Some(0.0), Some(60.0), Some(10.0)],
        );
        assert_eq!(ratios, vec![Some(1.0), Some(1.0), Some(0.5), None]);
    }

    #[test]
    fn test_loss_ratio_missing_premium() {
        assert_eq!(loss_ratio(&[Some(5.0)], &[None]), vec![None]);
    }

    #[test]
    fn test_claim_frequency_per_policy() {
        let claims = [Some(0.0), Some(100.0), Some(0.0), Some(0.0)];
        let occurred = claim_occurred(&claims);
        let frequency = claim_frequency(&ids(&["A", "A", "B", "B"]), &occurred);
        assert_eq!(occurred, vec![false, true, false, false]);
        assert_eq!(frequency, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_claim_frequency_missing_key() {
        let frequency = claim_frequency(&[None, None], &[true, false]);
        assert_eq!(frequency, vec![1, 0]);
    }

    #[test]
    fn test_claim_severity_and_margin() {
        let claims = [Some(0.0), Some(120.0), None];
        let premium = [Some(100.0), Some(100.0), Some(50.0)];
        let occurred = claim_occurred(&claims);

        assert_eq!(claim_severity(&claims, &occurred), vec![0.0, 120.0, 0.0]);
        assert_eq!(margin(&premium, &claims), vec![Some(100.0), Some(-20.0), None]);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut df = df![
            "PolicyID" => [1i64, 1, 2],
            "TotalPremium" => [100.0, 0.0, 50.0],
            "TotalClaims" => [0.0, 40.0, 0.0],
        ]
        .unwrap();

        attach_loss_ratio(&mut df).unwrap();
        attach_claim_metrics(&mut df, "PolicyID").unwrap();
        let width = df.width();
        attach_loss_ratio(&mut df).unwrap();
        attach_claim_metrics(&mut df, "PolicyID").unwrap();

        assert_eq!(df.width(), width);
        assert_eq!(width, 8);
        let frequency: Vec<Option<i32>> = df
            .column("ClaimFrequency")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(frequency, vec![Some(1), Some(1), Some(0)]);
    }

    #[test]
    fn test_attach_per_row() {
        let mut df = df![
            "TotalPremium" => [100.0, 50.0],
            "TotalClaims" => [10.0, 0.0],
        ]
        .unwrap();

        attach_claim_metrics_per_row(&mut df).unwrap();
        assert_eq!(numeric_values(&df, "ClaimFrequency").unwrap(), vec![Some(1.0), Some(0.0)]);
        assert_eq!(numeric_values(&df, "Margin").unwrap(), vec![Some(90.0), Some(50.0)]);
    }

    #[test]
    fn test_metrics_summary() {
        let df = df![
            "LossRatio" => [Some(0.5), Some(1.5), None],
            "WrittenOff" => [Some("Yes"), Some("No"), None],
        ]
        .unwrap();

        let summary = compute_metrics_summary(&df).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns, 2);
        assert_eq!(summary.missing_values, 2);
        assert_relative_eq!(summary.mean_loss_ratio, 1.0);
        assert_relative_eq!(summary.writtenoff_ratio, 1.0 / 3.0);
    }
}
