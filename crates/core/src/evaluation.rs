//! Offline hold-out evaluation of a segment model. Nothing is persisted.

use agrocast_dataset::PriceSource;
use agrocast_forest::{mean_absolute_error, r2_score, train_test_split, ForestConfig, ForestTrainer};
use agrocast_types::SegmentKey;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::features::{build_training_features, training_set};
use crate::TrainingFailure;

/// Share of rows held out by default.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRow {
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub key: SegmentKey,
    pub train_rows: usize,
    pub test_rows: usize,
    pub mean_absolute_error: f64,
    pub r2: f64,
    /// Held-out rows in date order
    pub rows: Vec<EvaluationRow>,
}

/// Fit on a shuffled train split (seeded by `config.seed`) and score the
/// held-out rows.
pub fn evaluate_segment(
    source: &dyn PriceSource,
    key: &SegmentKey,
    config: &ForestConfig,
    test_fraction: f64,
) -> Result<EvaluationReport, TrainingFailure> {
    let segment = source.load_segment(key)?;
    if segment.is_empty() {
        return Err(TrainingFailure::EmptySegment(key.clone()));
    }

    let samples = build_training_features(&segment);
    if samples.is_empty() {
        return Err(TrainingFailure::InsufficientHistory {
            key: key.clone(),
            rows: segment.len(),
        });
    }

    let set = training_set(&samples)?;
    let (train_idx, mut test_idx) = train_test_split(set.len(), test_fraction, config.seed)?;
    let model = ForestTrainer::new(config.clone()).train(&set.subset(&train_idx)?)?;

    test_idx.sort_by_key(|&i| samples[i].date);
    let test = set.subset(&test_idx)?;
    let predicted = model.predict_batch(&test.features)?;

    let report = EvaluationReport {
        key: key.clone(),
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        mean_absolute_error: mean_absolute_error(&test.targets, &predicted)?,
        r2: r2_score(&test.targets, &predicted)?,
        rows: test_idx
            .iter()
            .zip(&predicted)
            .map(|(&i, &p)| EvaluationRow {
                date: samples[i].date,
                actual: samples[i].target,
                predicted: p,
            })
            .collect(),
    };

    info!(
        "Evaluated {}: MAE {:.2}, R2 {:.3} on {} held-out rows",
        key, report.mean_absolute_error, report.r2, report.test_rows
    );
    Ok(report)
}
