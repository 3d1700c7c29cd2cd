//! Error types for the symbol shell.

use thiserror::Error;

/// Result type for shell operations.
pub type ShellResult<T> = Result<T, ShellError>;

/// Comprehensive error type for the shell core.
#[derive(Error, Debug)]
pub enum ShellError {
    /// Malformed addressing token (`#` empty segment, `$sub` with no body, ...).
    #[error("{0}")]
    Parse(String),

    /// Target does not exist (sub, routine, key, path, runner, alias).
    #[error("{0}")]
    NotFound(String),

    /// Well-formed target, wrong shape for the operation (level mismatch, leaf vs. node).
    #[error("{0}")]
    Validation(String),

    /// Mutation refused because the routine is under a runner lock.
    #[error("{0}")]
    LockConflict(String),

    /// Expansion-loop cycle or depth-bound failure.
    #[error("{0}")]
    Expansion(String),

    /// Filesystem bridge failure.
    #[error("{0}")]
    Io(String),

    /// LLM HTTP bridge failure (includes `"Q timeout"`).
    #[error("{0}")]
    Remote(String),

    /// Anything else (config, registry lookups).
    #[error("{0}")]
    Internal(String),
}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        ShellError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for ShellError {
    fn from(err: reqwest::Error) -> Self {
        ShellError::Remote(err.to_string())
    }
}
