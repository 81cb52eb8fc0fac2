//! Regression metrics.

use crate::ForestError;

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<(), ForestError> {
    if actual.len() != predicted.len() {
        return Err(ForestError::LengthMismatch {
            features: predicted.len(),
            targets: actual.len(),
        });
    }
    if actual.is_empty() {
        return Err(ForestError::EmptyTrainingSet);
    }
    Ok(())
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64, ForestError> {
    check_lengths(actual, predicted)?;
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(total / actual.len() as f64)
}

/// Coefficient of determination.
///
/// A constant `actual` series scores 1.0 when matched exactly and 0.0
/// otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64, ForestError> {
    check_lengths(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}
