//! Error types for performances.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Errors raised when starting or running a performance.
#[derive(Error, Debug)]
pub enum StageError {
    /// No playable track; raised before the singing flag is touched.
    #[error("No songs available in {0}")]
    AssetMissing(PathBuf),

    #[error("A performance is already in progress")]
    AlreadyPerforming,

    #[error("Failed to read audio {path}: {message}")]
    Audio { path: PathBuf, message: String },

    #[error("Performance task aborted: {0}")]
    Aborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
