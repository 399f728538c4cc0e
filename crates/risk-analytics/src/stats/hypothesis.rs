//! Hypothesis tests comparing claim behaviour across groups.

use crate::config::HypothesisConfig;
use crate::error::{Result, ResultExt, RiskError};
use crate::metrics::{attach_claim_metrics, attach_claim_metrics_per_row};
use crate::types::{HypothesisTestResult, columns};
use crate::utils::{has_column, numeric_values, string_values, value_counts};
use polars::prelude::*;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Raw outcome of a Welch t-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchOutcome {
    pub t_stat: f64,
    pub df: f64,
    pub p_value: f64,
}

/// Raw outcome of a chi-squared independence test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquaredOutcome {
    pub chi2: f64,
    pub dof: usize,
    pub p_value: f64,
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, ss / (n - 1.0))
}

fn student_t_two_sided_p(t_stat: f64, df: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| RiskError::DegenerateStatistic(format!("t distribution with df={df}: {e}")))?;
    Ok((2.0 * dist.sf(t_stat.abs())).min(1.0))
}

fn chi_squared_p(chi2: f64, dof: usize) -> Result<f64> {
    let dist = ChiSquared::new(dof as f64)
        .map_err(|e| RiskError::DegenerateStatistic(format!("chi-squared with dof={dof}: {e}")))?;
    Ok(dist.sf(chi2))
}

/// Welch's unequal-variance t-test between two samples.
///
/// Each sample needs at least two observations; if both samples have zero
/// variance the statistic is undefined and the test fails.
pub fn welch_t_test(
    a: &[f64],
    b: &[f64],
    label_a: &str,
    label_b: &str,
) -> Result<WelchOutcome> {
    for (label, sample) in [(label_a, a), (label_b, b)] {
        if sample.len() < 2 {
            return Err(RiskError::InsufficientObservations {
                group: label.to_string(),
                found: sample.len(),
                required: 2,
            });
        }
    }

    let (mean_a, var_a) = mean_and_variance(a);
    let (mean_b, var_b) = mean_and_variance(b);
    let se_a = var_a / a.len() as f64;
    let se_b = var_b / b.len() as f64;
    let se = se_a + se_b;

    if se == 0.0 {
        return Err(RiskError::DegenerateStatistic(format!(
            "both '{label_a}' and '{label_b}' have zero variance"
        )));
    }

    let t_stat = (mean_a - mean_b) / se.sqrt();
    let df = se * se
        / (se_a * se_a / (a.len() as f64 - 1.0) + se_b * se_b / (b.len() as f64 - 1.0));
    let p_value = student_t_two_sided_p(t_stat, df)?;

    Ok(WelchOutcome { t_stat, df, p_value })
}

/// Chi-squared test of independence on an observed contingency table.
///
/// Tables with one degree of freedom get Yates' continuity correction.
pub fn chi_squared_independence(
    observed: &[Vec<f64>],
    row: &str,
    column: &str,
) -> Result<ChiSquaredOutcome> {
    let degenerate = |reason: String| RiskError::DegenerateContingency {
        row: row.to_string(),
        column: column.to_string(),
        reason,
    };

    let n_rows = observed.len();
    let n_cols = observed.first().map_or(0, Vec::len);
    if n_rows < 2 || n_cols < 2 {
        return Err(degenerate(format!("table is {n_rows}x{n_cols}, need at least 2x2")));
    }
    if observed.iter().any(|r| r.len() != n_cols) {
        return Err(degenerate("rows have different lengths".to_string()));
    }

    let row_sums: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..n_cols)
        .map(|j| observed.iter().map(|r| r[j]).sum())
        .collect();
    let total: f64 = row_sums.iter().sum();

    let dof = (n_rows - 1) * (n_cols - 1);
    let mut chi2 = 0.0;
    for (i, obs_row) in observed.iter().enumerate() {
        for (j, &obs) in obs_row.iter().enumerate() {
            let expected = if total > 0.0 {
                row_sums[i] * col_sums[j] / total
            } else {
                0.0
            };
            if expected == 0.0 {
                return Err(degenerate(format!("zero expected frequency at cell ({i}, {j})")));
            }

            let obs = if dof == 1 {
                let diff = expected - obs;
                obs + diff.abs().min(0.5) * diff.signum()
            } else {
                obs
            };
            chi2 += (obs - expected).powi(2) / expected;
        }
    }

    Ok(ChiSquaredOutcome {
        chi2,
        dof,
        p_value: chi_squared_p(chi2, dof)?,
    })
}

/// Welch t-test of `metric_col` between two values of `group_col`.
///
/// Group values are compared by their text rendering; rows with a missing
/// metric are dropped.
pub fn t_test_groups(
    df: &DataFrame,
    group_col: &str,
    metric_col: &str,
    group_a: &str,
    group_b: &str,
    alpha: f64,
) -> Result<HypothesisTestResult> {
    let groups = string_values(df, group_col)?;
    let metric = numeric_values(df, metric_col)?;

    let mut a = Vec::new();
    let mut b = Vec::new();
    for (g, m) in groups.iter().zip(metric.iter()) {
        match (g.as_deref(), m) {
            (Some(g), Some(m)) if g == group_a => a.push(*m),
            (Some(g), Some(m)) if g == group_b => b.push(*m),
            _ => {}
        }
    }

    let outcome = welch_t_test(&a, &b, group_a, group_b)?;
    Ok(HypothesisTestResult::TTest {
        metric: metric_col.to_string(),
        group_col: group_col.to_string(),
        group_a: group_a.to_string(),
        group_b: group_b.to_string(),
        n_a: a.len(),
        n_b: b.len(),
        t_stat: outcome.t_stat,
        df: outcome.df,
        p_value: outcome.p_value,
        significant: outcome.p_value < alpha,
    })
}

/// Chi-squared independence test between two categorical columns.
///
/// Rows missing either value are excluded.
pub fn chi_squared_test(
    df: &DataFrame,
    group_col: &str,
    target_col: &str,
    alpha: f64,
) -> Result<HypothesisTestResult> {
    let groups = string_values(df, group_col)?;
    let targets = string_values(df, target_col)?;

    let mut counts: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    let mut target_levels: Vec<&str> = Vec::new();
    for (g, t) in groups.iter().zip(targets.iter()) {
        if let (Some(g), Some(t)) = (g.as_deref(), t.as_deref()) {
            *counts.entry(g).or_default().entry(t).or_insert(0.0) += 1.0;
            if !target_levels.contains(&t) {
                target_levels.push(t);
            }
        }
    }
    target_levels.sort_unstable();

    let table: Vec<Vec<f64>> = counts
        .values()
        .map(|row| {
            target_levels
                .iter()
                .map(|t| row.get(t).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    let outcome = chi_squared_independence(&table, group_col, target_col)?;
    Ok(HypothesisTestResult::ChiSquared {
        group_col: group_col.to_string(),
        target_col: target_col.to_string(),
        chi2: outcome.chi2,
        dof: outcome.dof,
        p_value: outcome.p_value,
        significant: outcome.p_value < alpha,
    })
}

/// First two distinct non-missing values in order of appearance.
fn first_two_distinct(values: &[Option<String>], column: &str) -> Result<(String, String)> {
    let mut distinct: Vec<&str> = Vec::with_capacity(2);
    for v in values.iter().flatten() {
        if !distinct.contains(&v.as_str()) {
            distinct.push(v.as_str());
            if distinct.len() == 2 {
                return Ok((distinct[0].to_string(), distinct[1].to_string()));
            }
        }
    }
    Err(RiskError::InvalidInput(format!(
        "column '{column}' has fewer than two distinct values"
    )))
}

/// Two most frequent values, ties broken by first appearance.
fn top_two(values: &[Option<String>], column: &str) -> Result<(String, String)> {
    let counts = value_counts(values);
    match counts.as_slice() {
        [first, second, ..] => Ok((first.0.clone(), second.0.clone())),
        _ => Err(RiskError::InvalidInput(format!(
            "column '{column}' has fewer than two distinct values"
        ))),
    }
}

/// The standard battery of claim-risk hypothesis tests.
pub struct HypothesisSuite {
    config: HypothesisConfig,
}

impl HypothesisSuite {
    pub fn new(config: HypothesisConfig) -> Self {
        Self { config }
    }

    /// Attach claim metrics to `df` and run, in order:
    /// 1. ClaimFrequency between the first two provinces
    /// 2. ClaimFrequency between the two most common postal codes
    /// 3. Margin between the same postal codes
    /// 4. ClaimFrequency between Male and Female
    /// 5. Chi-squared of Gender against ClaimOccurred
    ///
    /// Any failing test aborts the battery.
    pub fn run(&self, df: &mut DataFrame) -> Result<Vec<HypothesisTestResult>> {
        if has_column(df, columns::POLICY_ID) {
            attach_claim_metrics(df, columns::POLICY_ID)?;
        } else {
            warn!(
                "'{}' not present, claim frequency computed per row",
                columns::POLICY_ID
            );
            attach_claim_metrics_per_row(df)?;
        }

        let alpha = self.config.alpha;
        let mut results = Vec::with_capacity(5);

        let provinces = string_values(df, columns::PROVINCE)?;
        let (p1, p2) = first_two_distinct(&provinces, columns::PROVINCE)?;
        results.push(
            t_test_groups(df, columns::PROVINCE, columns::CLAIM_FREQUENCY, &p1, &p2, alpha)
                .context("Province claim frequency test")?,
        );

        let postal_codes = string_values(df, columns::POSTAL_CODE)?;
        let (z1, z2) = top_two(&postal_codes, columns::POSTAL_CODE)?;
        results.push(
            t_test_groups(df, columns::POSTAL_CODE, columns::CLAIM_FREQUENCY, &z1, &z2, alpha)
                .context("Postal code claim frequency test")?,
        );
        results.push(
            t_test_groups(df, columns::POSTAL_CODE, columns::MARGIN, &z1, &z2, alpha)
                .context("Postal code margin test")?,
        );

        results.push(
            t_test_groups(df, columns::GENDER, columns::CLAIM_FREQUENCY, "Male", "Female", alpha)
                .context("Gender claim frequency test")?,
        );

        results.push(
            chi_squared_test(df, columns::GENDER, columns::CLAIM_OCCURRED, alpha)
                .context("Gender claim occurrence test")?,
        );

        for result in &results {
            info!(
                "{} [{}]",
                result.describe(),
                if result.is_significant() { "significant" } else { "not significant" }
            );
        }

        Ok(results)
    }
}
