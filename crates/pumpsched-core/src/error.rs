//! Error types for pumpsched

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for pumpsched
#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Shape error: {what} has length {actual}, expected {expected}")]
    Shape {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Batch mismatch: {profiles} profile days vs {prices} price days")]
    BatchMismatch { profiles: usize, prices: usize },

    #[error("Non-finite value in {what} at day {day}, hour {hour}")]
    NonFinite {
        what: String,
        day: usize,
        hour: usize,
    },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint not found: {}", .0.display())]
    CheckpointMissing(PathBuf),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedError {
    pub fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Shape {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Missing checkpoints are a skip condition, not a failure
    pub fn is_missing_checkpoint(&self) -> bool {
        matches!(self, Self::CheckpointMissing(_))
    }
}

/// Result type alias for pumpsched operations
pub type Result<T> = std::result::Result<T, SchedError>;
