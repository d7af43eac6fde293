//! Error types for the mutiny library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using mutiny's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating or evaluating mutants.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Parse error from tree-sitter.
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A mutation round-trip invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The test command outlived its deadline and was killed.
    #[error("Test command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// A pre-mutation hook asked for this mutant to be skipped.
    #[error("Mutant skipped by hook")]
    Skip,

    /// The unmodified test suite does not pass.
    #[error("Tests don't run cleanly without mutations. Test command was: {command}")]
    BaselineFailed { command: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Result cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Timeout { .. } | Self::Skip)
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
