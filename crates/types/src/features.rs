use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of model inputs per row.
pub const FEATURE_COUNT: usize = 5;

/// Column names in feature-vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "rainfall",
    "demand",
    "month",
    "day_of_week",
    "moving_average_7_day",
];

/// Model input for a single day of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub rainfall: f64,
    pub demand: f64,
    /// 1..=12
    pub month: u32,
    /// 0..=6, Monday is 0
    pub day_of_week: u32,
    pub moving_average_7_day: f64,
}

impl FeatureRow {
    /// Calendar features come from `date`; the rest is supplied by the caller.
    pub fn for_date(date: NaiveDate, rainfall: f64, demand: f64, moving_average_7_day: f64) -> Self {
        Self {
            rainfall,
            demand,
            month: date.month(),
            day_of_week: date.weekday().num_days_from_monday(),
            moving_average_7_day,
        }
    }

    /// Flatten into the order given by [`FEATURE_NAMES`].
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.rainfall,
            self.demand,
            f64::from(self.month),
            f64::from(self.day_of_week),
            self.moving_average_7_day,
        ]
    }
}

/// A feature row paired with the price it should predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub date: NaiveDate,
    pub features: FeatureRow,
    pub target: f64,
}
