use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing the canonical dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("historical data file '{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset must contain columns {}; missing {}", .required.join(", "), .missing.join(", "))]
    MissingColumns {
        required: Vec<&'static str>,
        missing: Vec<String>,
    },

    #[error("line {line}: {message}")]
    InvalidRow { line: usize, message: String },
}
