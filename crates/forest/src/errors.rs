use thiserror::Error;

/// Errors raised while fitting, validating or decoding a forest.
#[derive(Debug, Error)]
pub enum ForestError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("row {row} has {found} features, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("non-finite value in row {row}")]
    NonFinite { row: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("model validation failed: {0}")]
    ValidationFailed(String),

    #[error("model hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: String, computed: String },

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
