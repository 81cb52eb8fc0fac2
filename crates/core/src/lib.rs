//! Agrocast Core - feature engineering, segment model lifecycle and
//! prediction.
//!
//! A segment is the history of one (crop, state) pair. Each segment gets its
//! own random-forest model, trained lazily from the canonical dataset the
//! first time it is needed and persisted through an artifact store.

pub mod errors;
pub mod evaluation;
pub mod features;
pub mod predictor;
pub mod segment_store;

pub use errors::{FeatureError, PredictionError, TrainingFailure};
pub use evaluation::{evaluate_segment, EvaluationReport, EvaluationRow, DEFAULT_TEST_FRACTION};
pub use features::{
    build_query_features, build_training_features, training_set, MOVING_AVERAGE_WINDOW,
    QUERY_LOOKBACK_DAYS,
};
pub use predictor::{PredictionQuery, Predictor};
pub use segment_store::{SegmentModelStore, SegmentOutcome, TrainStatus};
