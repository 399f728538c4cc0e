//! Seeded train/test partitioning.

use crate::error::{Result, RiskError};
use crate::modeling::features::FeatureMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Rows partitioned into a training and a held-out test set.
#[derive(Debug, Clone)]
pub struct TrainTestSplit<T> {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Vec<T>,
    pub y_test: Vec<T>,
}

/// Shuffle rows with a seeded generator and hold out `ceil(n * test_size)`
/// of them for testing.
///
/// The same seed always yields the same partition. Both partitions must be
/// non-empty.
pub fn train_test_split<T: Clone>(
    x: &FeatureMatrix,
    y: &[T],
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit<T>> {
    let n = x.n_rows();
    if n != y.len() {
        return Err(RiskError::LengthMismatch {
            left: "features".to_string(),
            left_len: n,
            right: "target".to_string(),
            right_len: y.len(),
        });
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(RiskError::InvalidInput(format!(
            "test size must be in (0, 1), got {test_size}"
        )));
    }

    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(RiskError::InvalidInput(format!(
            "cannot split {n} rows with test size {test_size}: both partitions must be non-empty"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok(TrainTestSplit {
        x_train: x.select_rows(train_idx),
        x_test: x.select_rows(test_idx),
        y_train: train_idx.iter().map(|&i| y[i].clone()).collect(),
        y_test: test_idx.iter().map(|&i| y[i].clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn matrix(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let values = Array2::from_shape_fn((n, 2), |(i, j)| (i * 10 + j) as f64);
        let y = (0..n).map(|i| i as f64).collect();
        (
            FeatureMatrix {
                names: vec!["a".to_string(), "b".to_string()],
                values,
            },
            y,
        )
    }

    #[test]
    fn test_split_sizes() {
        let (x, y) = matrix(10);
        let split = train_test_split(&x, &y, 0.3, 42).unwrap();
        assert_eq!(split.x_test.n_rows(), 3);
        assert_eq!(split.x_train.n_rows(), 7);
        assert_eq!(split.y_test.len(), 3);

        // test count rounds up
        let split = train_test_split(&x, &y, 0.25, 42).unwrap();
        assert_eq!(split.y_test.len(), 3);
    }

    #[test]
    fn test_split_rows_stay_aligned() {
        let (x, y) = matrix(20);
        let split = train_test_split(&x, &y, 0.3, 7).unwrap();
        for (row, target) in split.x_train.values.rows().into_iter().zip(split.y_train.iter()) {
            assert_eq!(row[0], target * 10.0);
        }

        let mut all: Vec<f64> = split.y_train.iter().chain(split.y_test.iter()).copied().collect();
        all.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(all, y);
    }

    #[test]
    fn test_split_is_deterministic() {
        let (x, y) = matrix(30);
        let a = train_test_split(&x, &y, 0.3, 42).unwrap();
        let b = train_test_split(&x, &y, 0.3, 42).unwrap();
        let c = train_test_split(&x, &y, 0.3, 43).unwrap();
        assert_eq!(a.y_test, b.y_test);
        assert_ne!(a.y_test, c.y_test);
    }

    #[test]
    fn test_split_rejects_degenerate_partitions() {
        let (x, y) = matrix(1);
        assert!(train_test_split(&x, &y, 0.3, 42).is_err());

        let (x, y) = matrix(10);
        assert!(train_test_split(&x, &y, 0.0, 42).is_err());
        assert!(train_test_split(&x, &y, 1.0, 42).is_err());
        assert!(matches!(
            train_test_split(&x, &y[..5], 0.3, 42).unwrap_err(),
            RiskError::LengthMismatch { .. }
        ));
    }
}
