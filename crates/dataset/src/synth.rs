//! Placeholder dataset synthesis.
//!
//! Produces a plausible daily price table for every catalog segment so the
//! service can be exercised without real market data.

use agrocast_types::{PriceRecord, SegmentKey, SupportedCatalog};
use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};

const DEFAULT_BASE_PRICE: f64 = 2000.0;

/// Base price per quintal for each known crop.
const BASE_PRICES: [(&str, f64); 8] = [
    ("Arhar", 6300.0),
    ("Cotton", 7500.0),
    ("Moong", 6800.0),
    ("Mustard", 5500.0),
    ("Wheat", 2125.0),
    ("Paddy", 2040.0),
    ("Maize", 1962.0),
    ("Sugarcane", 350.0),
];

/// Regional adjustment applied on top of the crop base price.
const STATE_MULTIPLIERS: [(&str, f64); 7] = [
    ("Uttar Pradesh", 1.0),
    ("Punjab", 1.05),
    ("Madhya Pradesh", 0.98),
    ("West Bengal", 0.95),
    ("Maharashtra", 1.02),
    ("Rajasthan", 0.97),
    ("Gujarat", 1.08),
];

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub start: NaiveDate,
    pub days: usize,
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            days: 1000,
            seed: 42,
        }
    }
}

/// Generate `days` daily rows for every catalog segment.
///
/// Price drifts linearly from base to 1.1 × base with uniform noise of up to
/// 10 % of base on top. Rainfall is in [0, 50), demand in [500, 700).
pub fn synthesize(catalog: &SupportedCatalog, config: &SynthConfig) -> Vec<PriceRecord> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut records = Vec::with_capacity(catalog.segments().len() * config.days);

    for key in catalog.segments() {
        let base = segment_base_price(&key);
        for day in 0..config.days {
            let trend = if config.days > 1 {
                base + (base * 0.1) * day as f64 / (config.days - 1) as f64
            } else {
                base
            };
            let price = trend + rng.gen::<f64>() * base * 0.1;
            let rainfall = rng.gen::<f64>() * 50.0;
            let demand = rng.gen::<f64>() * 200.0 + 500.0;
            let date = config.start + Duration::days(day as i64);
            records.push(PriceRecord::new(date, &key, price, rainfall, demand));
        }
    }

    records
}

fn segment_base_price(key: &SegmentKey) -> f64 {
    let base = BASE_PRICES
        .iter()
        .find(|(crop, _)| *crop == key.crop)
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_BASE_PRICE);
    let multiplier = STATE_MULTIPLIERS
        .iter()
        .find(|(state, _)| *state == key.state)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0);
    base * multiplier
}
