//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend failed while executing an operation.
    #[error("storage error: {0}")]
    Internal(String),

    /// The backend could not be reached or opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The namespace or key is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Whether the failure is transient and the operation may succeed later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Connection(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
