//! Error types for the vitals pipeline.
//!
//! Only [`PipelineError::NoInputData`] aborts an ingestion run. Unreadable
//! sources are reported as [`SourceReadError`] values alongside the
//! ingested records instead of being returned as failures.

use crate::ingest::types::StayId;
use std::path::PathBuf;
use thiserror::Error;

/// A single source table that could not be read and was skipped.
#[derive(Debug, Clone, Error)]
#[error("could not read source {path:?}: {reason}")]
pub struct SourceReadError {
    pub path: PathBuf,
    pub reason: String,
}

impl SourceReadError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by an external predictor.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predictor returned {actual} values, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error("predictor input has {actual} features, expected {expected}")]
    InputShape { expected: usize, actual: usize },
    #[error("predictor failed: {0}")]
    Failed(String),
}

/// Errors produced by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable source table was found at the input location.
    #[error("no usable input data found at {location:?}")]
    NoInputData { location: PathBuf },

    #[error(transparent)]
    SourceRead(#[from] SourceReadError),

    #[error("patient stay {0} not found")]
    PatientNotFound(StayId),

    #[error("stay {stay_id} has {available} records, {required} required")]
    InsufficientHistory {
        stay_id: StayId,
        required: usize,
        available: usize,
    },

    /// A required configuration value is absent or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid patient series: {0}")]
    InvalidSeries(String),

    #[error("no outcome label supplied for stay {0}")]
    MissingLabel(StayId),

    #[error("feature manifest mismatch: fitted on {expected} features, got {actual}")]
    ManifestMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Predictor(#[from] PredictorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_history_message() {
        let err = PipelineError::InsufficientHistory {
            stay_id: StayId::new("141168"),
            required: 24,
            available: 5,
        };
        let message = err.to_string();
        assert!(message.contains("141168"));
        assert!(message.contains("24"));
        assert!(message.contains('5'));
    }

    #[test]
    fn test_source_read_converts() {
        let err: PipelineError = SourceReadError::new("/tmp/x.csv", "bad header").into();
        assert!(matches!(err, PipelineError::SourceRead(_)));
        assert!(err.to_string().contains("bad header"));
    }
}
