//! Risk-based premium derivation.

use crate::error::{Result, RiskError};
use polars::prelude::{NamedFrom, Series};
use serde::{Deserialize, Serialize};

/// Default multiplier over expected loss.
pub const DEFAULT_LOADING_FACTOR: f64 = 1.2;

/// Premium per policy: claim probability x expected severity x loading.
///
/// Both inputs must be equally long, probabilities must lie in [0, 1],
/// severities must be non-negative and the loading must be positive.
pub fn compute_optimized_premium(
    p_claim: &[f64],
    expected_claim: &[f64],
    loading_factor: f64,
) -> Result<Vec<f64>> {
    if p_claim.len() != expected_claim.len() {
        return Err(RiskError::LengthMismatch {
            left: "p_claim".to_string(),
            left_len: p_claim.len(),
            right: "expected_claim".to_string(),
            right_len: expected_claim.len(),
        });
    }

    if !(loading_factor.is_finite() && loading_factor > 0.0) {
        return Err(RiskError::InvalidInput(format!(
            "loading factor must be positive and finite, got {loading_factor}"
        )));
    }

    if let Some((i, p)) = p_claim
        .iter()
        .enumerate()
        .find(|(_, p)| !(0.0..=1.0).contains(*p))
    {
        return Err(RiskError::InvalidInput(format!(
            "claim probability at index {i} is outside [0, 1]: {p}"
        )));
    }

    if let Some((i, s)) = expected_claim
        .iter()
        .enumerate()
        .find(|(_, s)| !(s.is_finite() && **s >= 0.0))
    {
        return Err(RiskError::InvalidInput(format!(
            "expected claim at index {i} must be a non-negative number: {s}"
        )));
    }

    Ok(p_claim
        .iter()
        .zip(expected_claim.iter())
        .map(|(p, s)| p * s * loading_factor)
        .collect())
}

/// Distribution of derived premiums, reported in place of a histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub loading_factor: f64,
}

impl PremiumSummary {
    pub fn from_premiums(premiums: &[f64], loading_factor: f64) -> Option<Self> {
        let median = Series::new("premium".into(), premiums).median()?;
        let count = premiums.len();
        let mean = premiums.iter().sum::<f64>() / count as f64;
        let min = premiums.iter().copied().fold(f64::INFINITY, f64::min);
        let max = premiums.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count,
            mean,
            min,
            max,
            median,
            loading_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_premium_is_elementwise_product() {
        let premiums =
            compute_optimized_premium(&[0.1, 0.5, 0.0], &[1000.0, 200.0, 5000.0], 1.2).unwrap();
        assert_relative_eq!(premiums[0], 120.0, epsilon = 1e-9);
        assert_relative_eq!(premiums[1], 120.0, epsilon = 1e-9);
        assert_eq!(premiums[2], 0.0);
    }

    #[test]
    fn test_premium_literal_values() {
        let premiums = compute_optimized_premium(&[0.5, 0.2], &[1000.0, 500.0], 1.2).unwrap();
        assert_eq!(premiums.len(), 2);
        assert_relative_eq!(premiums[0], 600.0, epsilon = 1e-9);
        assert_relative_eq!(premiums[1], 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_default_loading() {
        let premiums = compute_optimized_premium(&[1.0], &[100.0], DEFAULT_LOADING_FACTOR).unwrap();
        assert_relative_eq!(premiums[0], 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_length_mismatch() {
        let err = compute_optimized_premium(&[0.1, 0.2], &[100.0], 1.2).unwrap_err();
        assert!(matches!(err, RiskError::LengthMismatch { left_len: 2, right_len: 1, .. }));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            compute_optimized_premium(&[0.1], &[100.0], 0.0).unwrap_err(),
            RiskError::InvalidInput(_)
        ));
        assert!(compute_optimized_premium(&[1.5], &[100.0], 1.2).is_err());
        assert!(compute_optimized_premium(&[0.5], &[-1.0], 1.2).is_err());
        assert!(compute_optimized_premium(&[0.5], &[100.0], f64::INFINITY).is_err());
    }

    #[test]
    fn test_premium_summary() {
        let summary = PremiumSummary::from_premiums(&[10.0, 30.0, 20.0, 40.0], 1.2).unwrap();
        assert_eq!(summary.count, 4);
        assert_relative_eq!(summary.mean, 25.0);
        assert_relative_eq!(summary.median, 25.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 40.0);
        assert!(PremiumSummary::from_premiums(&[], 1.2).is_none());
    }
}
