//! Path error types.

use thiserror::Error;

/// Errors produced while normalizing a repository-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path climbs above the repository root via `..` segments.
    #[error("path escapes the repository root: {path}")]
    EscapesRepository {
        /// The raw path as supplied by the caller.
        path: String,
    },

    /// The path is absolute where a repository-relative path was expected.
    #[error("absolute path not allowed: {path}")]
    Absolute {
        /// The raw path as supplied by the caller.
        path: String,
    },

    /// An absolute path that does not live under the repository root.
    #[error("path is outside the repository: {path}")]
    OutsideRepository {
        /// The raw path as supplied by the caller.
        path: String,
    },
}

impl PathError {
    /// The raw input that failed normalization.
    #[must_use]
    pub fn raw_path(&self) -> &str {
        match self {
            Self::EscapesRepository { path }
            | Self::Absolute { path }
            | Self::OutsideRepository { path } => path,
        }
    }
}

/// Result type for path operations.
pub type PathResult<T> = Result<T, PathError>;
