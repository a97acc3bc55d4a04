//! Proposal lifecycle error types.

use scopeward_core::ProposalId;
use scopeward_storage::StorageError;
use scopeward_workspace::ScopeGuardVerdict;
use thiserror::Error;

/// Errors from proposal operations.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// No proposal has this id.
    #[error("proposal not found: {0}")]
    NotFound(ProposalId),

    /// A proposal with this id already exists.
    #[error("proposal already exists: {0}")]
    AlreadyExists(ProposalId),

    /// The id cannot be used as a storage key.
    #[error("invalid proposal id: {0}")]
    InvalidId(String),

    /// The backing store could not be reached. Retrying may succeed.
    #[error("proposal store unavailable: {0}")]
    StoreUnavailable(String),

    /// The proposal's recorded scope is not allowed by the current policy.
    #[error("{}", .0.message.as_deref().unwrap_or("blocked by scope policy"))]
    PolicyBlocked(Box<ScopeGuardVerdict>),

    /// The approval resolver refused, failed, or timed out.
    #[error("approval resolution failed: {message}")]
    ApprovalResolutionFailed {
        /// Resolver or timeout message.
        message: String,
    },

    /// The proposal's diff has no entry for the requested file.
    #[error("file '{path}' is not part of proposal {id}")]
    FileNotInProposal {
        /// Proposal that was searched.
        id: ProposalId,
        /// Requested path.
        path: String,
    },

    /// A stored record could not be decoded.
    #[error("corrupt proposal record: {0}")]
    Corrupt(String),
}

impl ProposalError {
    /// Whether the caller may retry the whole operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StorageError> for ProposalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Connection(msg) | StorageError::Internal(msg) => {
                Self::StoreUnavailable(msg)
            },
            StorageError::Serialization(msg) => Self::Corrupt(msg),
            StorageError::InvalidKey(msg) => Self::InvalidId(msg),
            StorageError::NotFound(key) => Self::NotFound(ProposalId::from_string(key)),
        }
    }
}

/// Result type for proposal operations.
pub type ProposalResult<T> = Result<T, ProposalError>;
