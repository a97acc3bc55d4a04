//! External approval resolution.
//!
//! A proposal carrying an approval token can only change state once a
//! separate human-approval service has confirmed the decision. That service
//! sits behind [`ApprovalResolver`].

use std::fmt;

use async_trait::async_trait;
use scopeward_core::Token;
use serde::{Deserialize, Serialize};

/// Decision being confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalVerb {
    /// Confirm application.
    Approve,
    /// Confirm rejection.
    Reject,
}

impl fmt::Display for ApprovalVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Resolver answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResolution {
    /// Whether the decision was confirmed.
    pub ok: bool,
    /// Explanation, mainly for refusals.
    pub message: Option<String>,
}

impl ApprovalResolution {
    /// A confirmed decision.
    #[must_use]
    pub fn granted() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    /// A refused decision.
    #[must_use]
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// The resolver could not be reached or errored.
#[derive(Debug, thiserror::Error)]
#[error("approval resolver error: {0}")]
pub struct ApprovalResolverError(pub String);

/// Confirms decisions on approval-gated proposals.
#[async_trait]
pub trait ApprovalResolver: Send + Sync {
    /// Resolve `token` with `verb`.
    ///
    /// # Errors
    ///
    /// Returns an error when the resolver itself fails. A refusal is a
    /// successful call with `ok == false`.
    async fn resolve_approval(
        &self,
        token: &Token,
        verb: ApprovalVerb,
    ) -> Result<ApprovalResolution, ApprovalResolverError>;
}

/// Resolver for deployments without an approval service: every gated
/// proposal is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoApprovalResolver;

#[async_trait]
impl ApprovalResolver for NoApprovalResolver {
    async fn resolve_approval(
        &self,
        _token: &Token,
        verb: ApprovalVerb,
    ) -> Result<ApprovalResolution, ApprovalResolverError> {
        Ok(ApprovalResolution::refused(format!(
            "no approval resolver configured to {verb} this proposal"
        )))
    }
}
