use agrocast_dataset::DatasetError;
use agrocast_forest::ForestError;
use agrocast_storage::StorageError;
use agrocast_types::{CatalogError, SegmentKey};
use thiserror::Error;

use crate::features::MOVING_AVERAGE_WINDOW;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("segment has no records")]
    EmptySegment,
}

/// Why a segment model could not be produced. No artifact is written when
/// any of these is returned.
#[derive(Debug, Error)]
pub enum TrainingFailure {
    #[error("No data found for {0}")]
    EmptySegment(SegmentKey),

    #[error(
        "Not enough history for {key}: {rows} rows, need at least {}",
        MOVING_AVERAGE_WINDOW
    )]
    InsufficientHistory { key: SegmentKey, rows: usize },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("model fitting failed: {0}")]
    Forest(#[from] ForestError),
}

#[derive(Debug, Error)]
pub enum PredictionError {
    /// Raised before any dataset access or training.
    #[error(transparent)]
    UnsupportedSegment(#[from] CatalogError),

    #[error("Could not load/train model for {key}: {source}")]
    Training {
        key: SegmentKey,
        #[source]
        source: TrainingFailure,
    },

    #[error("No historical data found for {0}")]
    NoHistoricalData(SegmentKey),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Error during feature engineering: {0}")]
    Feature(#[from] FeatureError),

    #[error("Prediction failed: {0}")]
    Model(#[from] ForestError),
}

impl PredictionError {
    /// True for caller mistakes (unknown crop or state), false for failures
    /// on the service side.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, PredictionError::UnsupportedSegment(_))
    }
}
