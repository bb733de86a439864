//! Error types for routing and capture.

use thiserror::Error;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Router and capture errors.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Failed to launch '{app}': {source}")]
    Launch {
        app: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Recognizer '{program}' could not be started: {source}")]
    RecognizerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
