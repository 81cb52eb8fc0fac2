//! Feature derivation for one segment.
//!
//! Training rows use a trailing 7-row mean of price. Query rows use the mean
//! price of the 7 calendar days before the reference date, falling back to
//! the latest known price when that window is empty.

use agrocast_forest::{ForestError, TrainingSet};
use agrocast_types::{FeatureRow, PriceRecord, TrainingSample};
use chrono::{Duration, NaiveDate};

use crate::FeatureError;

/// Rows in the trailing training mean (current row included).
pub const MOVING_AVERAGE_WINDOW: usize = 7;

/// Calendar days before the reference date that feed the query mean.
pub const QUERY_LOOKBACK_DAYS: i64 = 7;

/// Turn a segment into training samples.
///
/// Records are stable-sorted by date first. The first six rows lack a full
/// window and are dropped, so `n >= 7` records yield `n - 6` samples and
/// shorter segments yield none.
pub fn build_training_features(segment: &[PriceRecord]) -> Vec<TrainingSample> {
    let mut ordered: Vec<&PriceRecord> = segment.iter().collect();
    ordered.sort_by_key(|record| record.date);

    if ordered.len() < MOVING_AVERAGE_WINDOW {
        return Vec::new();
    }

    ordered
        .windows(MOVING_AVERAGE_WINDOW)
        .map(|window| {
            let current = window[MOVING_AVERAGE_WINDOW - 1];
            let mean = window.iter().map(|record| record.price).sum::<f64>()
                / MOVING_AVERAGE_WINDOW as f64;
            TrainingSample {
                date: current.date,
                features: FeatureRow::for_date(current.date, current.rainfall, current.demand, mean),
                target: current.price,
            }
        })
        .collect()
}

/// Assemble the model input for a prediction on `reference_date`.
///
/// The window is `[reference_date - 7d, reference_date - 1d]`. If no record
/// falls inside it, the price of the chronologically latest record is used
/// no matter how old it is.
pub fn build_query_features(
    segment: &[PriceRecord],
    reference_date: NaiveDate,
    rainfall: f64,
    demand: f64,
) -> Result<FeatureRow, FeatureError> {
    let start = reference_date - Duration::days(QUERY_LOOKBACK_DAYS);
    let end = reference_date - Duration::days(1);

    let window: Vec<f64> = segment
        .iter()
        .filter(|record| record.date >= start && record.date <= end)
        .map(|record| record.price)
        .collect();

    let moving_average = if window.is_empty() {
        segment
            .iter()
            .max_by_key(|record| record.date)
            .map(|record| record.price)
            .ok_or(FeatureError::EmptySegment)?
    } else {
        window.iter().sum::<f64>() / window.len() as f64
    };

    Ok(FeatureRow::for_date(reference_date, rainfall, demand, moving_average))
}

/// Flatten samples into a forest training set.
pub fn training_set(samples: &[TrainingSample]) -> Result<TrainingSet, ForestError> {
    let features = samples
        .iter()
        .map(|sample| sample.features.to_vector().to_vec())
        .collect();
    let targets = samples.iter().map(|sample| sample.target).collect();
    TrainingSet::new(features, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrocast_types::SegmentKey;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(date: NaiveDate, price: f64) -> PriceRecord {
        PriceRecord::new(date, &SegmentKey::new("Wheat", "Punjab"), price, 1.0, 2.0)
    }

    #[test]
    fn test_training_rows_use_trailing_mean() {
        let segment: Vec<PriceRecord> = (1..=10).map(|d| record(day(d), d as f64)).collect();
        let samples = build_training_features(&segment);

        assert_eq!(samples.len(), 4);
        // first full window covers prices 1..=7
        assert_eq!(samples[0].date, day(7));
        assert_eq!(samples[0].features.moving_average_7_day, 4.0);
        assert_eq!(samples[0].target, 7.0);
        assert_eq!(samples[3].features.moving_average_7_day, 7.0);
        assert_eq!(samples[3].target, 10.0);
    }

    #[test]
    fn test_training_rows_sorted_by_date() {
        let mut segment: Vec<PriceRecord> = (1..=8).map(|d| record(day(d), d as f64)).collect();
        segment.reverse();
        let samples = build_training_features(&segment);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].date, day(7));
        assert_eq!(samples[1].target, 8.0);
    }

    #[test]
    fn test_short_segment_yields_nothing() {
        let segment: Vec<PriceRecord> = (1..=6).map(|d| record(day(d), 1.0)).collect();
        assert!(build_training_features(&segment).is_empty());
        assert!(build_training_features(&[]).is_empty());
    }

    #[test]
    fn test_query_window_mean() {
        let segment: Vec<PriceRecord> = (1..=20).map(|d| record(day(d), d as f64)).collect();
        let row = build_query_features(&segment, day(15), 3.5, 640.0).unwrap();

        // window is Jan 8..=Jan 14
        assert_eq!(row.moving_average_7_day, 11.0);
        assert_eq!(row.rainfall, 3.5);
        assert_eq!(row.demand, 640.0);
        assert_eq!(row.month, 1);
    }

    #[test]
    fn test_query_window_excludes_reference_date() {
        let segment = vec![record(day(10), 100.0), record(day(9), 50.0)];
        let row = build_query_features(&segment, day(10), 0.0, 0.0).unwrap();
        assert_eq!(row.moving_average_7_day, 50.0);
    }

    #[test]
    fn test_query_falls_back_to_latest_price() {
        // latest record is listed first to make sure the fallback is by date
        let segment = vec![record(day(3), 30.0), record(day(1), 10.0), record(day(2), 20.0)];
        let row = build_query_features(&segment, day(3) + Duration::days(30), 0.0, 0.0).unwrap();
        assert_eq!(row.moving_average_7_day, 30.0);
    }

    #[test]
    fn test_query_on_empty_segment_fails() {
        assert_eq!(
            build_query_features(&[], day(1), 0.0, 0.0),
            Err(FeatureError::EmptySegment)
        );
    }

    #[test]
    fn test_training_set_has_five_columns() {
        let segment: Vec<PriceRecord> = (1..=9).map(|d| record(day(d), d as f64)).collect();
        let set = training_set(&build_training_features(&segment)).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.feature_count, 5);
    }
}
