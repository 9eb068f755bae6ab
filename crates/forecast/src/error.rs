//! Error types for the forecasting pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while preparing data, training, or predicting.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the input.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A persisted artifact could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A column the pipeline depends on is absent.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// A column the pipeline aggregates holds no numeric value at all.
    #[error("column has no numeric values: {0}")]
    EmptyColumn(String),

    /// A daylight flag could not be interpreted.
    #[error("invalid daylight value {value:?} on row {row}")]
    InvalidDaylight { row: usize, value: String },

    /// The dataset has no usable rows.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Matrix dimensions do not line up.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    /// A model or transformer was used before `fit`.
    #[error("model has not been fitted")]
    NotFitted,

    /// Prediction input lacks feature values; names are in feature order.
    #[error("Missing fields: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    /// Prediction input holds NaN or an infinite value.
    #[error("non-finite value for field: {0}")]
    NonFinite(String),

    /// A required artifact file is not present.
    #[error("artifact not found: {0}")]
    ArtifactMissing(PathBuf),

    /// Input failed validation.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ForecastError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for the forecasting pipeline.
pub type Result<T> = std::result::Result<T, ForecastError>;
