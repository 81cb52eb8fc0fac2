//! Training matrices and deterministic splits.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::ForestError;

/// Dense feature matrix with one regression target per row.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub feature_count: usize,
}

impl TrainingSet {
    /// Build a training set, rejecting ragged rows and non-finite values.
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self, ForestError> {
        if features.len() != targets.len() {
            return Err(ForestError::LengthMismatch {
                features: features.len(),
                targets: targets.len(),
            });
        }
        let feature_count = features.first().map(Vec::len).ok_or(ForestError::EmptyTrainingSet)?;
        if feature_count == 0 {
            return Err(ForestError::DimensionMismatch {
                row: 0,
                expected: 1,
                found: 0,
            });
        }

        for (row, (values, target)) in features.iter().zip(&targets).enumerate() {
            if values.len() != feature_count {
                return Err(ForestError::DimensionMismatch {
                    row,
                    expected: feature_count,
                    found: values.len(),
                });
            }
            if !target.is_finite() || values.iter().any(|v| !v.is_finite()) {
                return Err(ForestError::NonFinite { row });
            }
        }

        Ok(Self {
            features,
            targets,
            feature_count,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Copy out the given rows, in the given order.
    pub fn subset(&self, rows: &[usize]) -> Result<Self, ForestError> {
        let features = rows.iter().map(|&i| self.features[i].clone()).collect();
        let targets = rows.iter().map(|&i| self.targets[i]).collect();
        Self::new(features, targets)
    }
}

/// Shuffle `0..n` with `seed` and cut it into (train, test) index lists.
///
/// The test part holds `ceil(n * test_fraction)` rows; both parts must end up
/// non-empty.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), ForestError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForestError::InvalidConfig(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ForestError::InvalidConfig(format!(
            "cannot split {n} rows with test fraction {test_fraction}"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok((train, order))
}
