//! Scope override status lookup.
//!
//! Override tokens are issued elsewhere; the guard only asks whether a token
//! is currently active for a domain and which extra roots it grants.

use async_trait::async_trait;
use scopeward_core::{Domain, RootPath, Token};
use serde::{Deserialize, Serialize};

/// One active grant attached to an override token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideGrant {
    /// Extra roots this grant adds to the allowed set.
    pub roots: Vec<RootPath>,
}

/// Status of an override token for a domain.
///
/// An empty `active` list means the token grants nothing here (expired,
/// issued for another domain, or unknown).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideStatus {
    /// Grants currently in force.
    pub active: Vec<OverrideGrant>,
}

impl OverrideStatus {
    /// A status that grants nothing.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Whether at least one grant is in force.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// All granted roots, in grant order.
    pub fn roots(&self) -> impl Iterator<Item = &RootPath> {
        self.active.iter().flat_map(|grant| grant.roots.iter())
    }
}

/// Error reported by an override status provider.
#[derive(Debug, thiserror::Error)]
#[error("override status lookup failed: {0}")]
pub struct OverrideLookupError(pub String);

/// Looks up the status of scope override tokens.
#[async_trait]
pub trait OverrideStatusProvider: Send + Sync {
    /// Report which grants `token` currently carries for `domain`.
    ///
    /// `domain` is `None` when the request has no domain.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup itself fails. The guard treats a
    /// failed lookup as an inactive override.
    async fn scope_override_status(
        &self,
        token: &Token,
        domain: Option<&Domain>,
    ) -> Result<OverrideStatus, OverrideLookupError>;
}

/// Provider for deployments without override tokens: nothing is ever active.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverrides;

#[async_trait]
impl OverrideStatusProvider for NoOverrides {
    async fn scope_override_status(
        &self,
        _token: &Token,
        _domain: Option<&Domain>,
    ) -> Result<OverrideStatus, OverrideLookupError> {
        Ok(OverrideStatus::inactive())
    }
}
