//! Error types for the core module.

use std::path::PathBuf;

use thiserror::Error;

use crate::mode::Mode;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue { key: String, message: String },

    #[error("Mode already active: {0}")]
    ModeBusy(Mode),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether this error comes from loading startup configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_)
                | Self::ConfigRead { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigValue { .. }
        )
    }
}
