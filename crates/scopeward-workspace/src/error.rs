//! Scope guard error types.

use scopeward_config::ConfigError;
use thiserror::Error;

/// Errors raised while resolving a scope context.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The repository configuration could not be read or is invalid.
    #[error("scope configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for scope guard operations.
pub type ScopeResult<T> = Result<T, ScopeError>;
