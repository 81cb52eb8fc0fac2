use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::segment::SegmentKey;

/// One row of the canonical price dataset.
///
/// Field names follow the CSV header (`Date,Crop,State,Price,Rainfall,Demand`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Rainfall")]
    pub rainfall: f64,
    #[serde(rename = "Demand")]
    pub demand: f64,
}

impl PriceRecord {
    pub fn new(
        date: NaiveDate,
        key: &SegmentKey,
        price: f64,
        rainfall: f64,
        demand: f64,
    ) -> Self {
        Self {
            date,
            crop: key.crop.clone(),
            state: key.state.clone(),
            price,
            rainfall,
            demand,
        }
    }

    /// Exact (case-sensitive) segment membership check.
    pub fn belongs_to(&self, key: &SegmentKey) -> bool {
        self.crop == key.crop && self.state == key.state
    }
}

/// Filter a dataset down to one segment, preserving input order.
pub fn filter_segment(records: &[PriceRecord], key: &SegmentKey) -> Vec<PriceRecord> {
    records
        .iter()
        .filter(|record| record.belongs_to(key))
        .cloned()
        .collect()
}
