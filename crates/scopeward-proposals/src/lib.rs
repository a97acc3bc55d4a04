//! Scopeward Proposals - reviewable change batches.
//!
//! An agent proposes edits as a [`Proposal`]: a combined unified diff plus
//! the files it declares. Reviewers apply or reject it through the
//! [`ProposalService`], which re-checks the proposal against the current
//! scope policy and, for approval-gated proposals, confirms the decision with
//! an external [`ApprovalResolver`] before the [`ProposalStore`] records it.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use scopeward_proposals::{Proposal, ProposalService, ProposalStore};
//! use scopeward_storage::MemoryKvStore;
//! use scopeward_workspace::ScopeGuard;
//!
//! let store = ProposalStore::new(Arc::new(MemoryKvStore::new()))?;
//! let service = ProposalService::new(store, ScopeGuard::for_repo("/path/to/repo"));
//!
//! let proposal = Proposal::pending("--- a/x.md\n+++ b/x.md\n", vec![]);
//! service.store().insert(&proposal).await?;
//! let outcome = service.apply(&proposal.id).await?;
//! assert!(outcome.ok);
//! # Ok(())
//! # }
//! ```
//!
//! Transitions are single compare-and-swap writes, so concurrent requests
//! for the same proposal settle on exactly one winner and every other caller
//! sees a no-op.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod approval;
pub mod diff;
pub mod error;
pub mod proposal;
pub mod service;
pub mod store;

pub use approval::{
    ApprovalResolution, ApprovalResolver, ApprovalResolverError, ApprovalVerb, NoApprovalResolver,
};
pub use diff::{DiffFileEntry, DiffQuality, ParsedDiff, parse_proposal_unified_diff};
pub use error::{ProposalError, ProposalResult};
pub use proposal::{Proposal, ProposalStatus, TransitionOutcome};
pub use service::{DEFAULT_APPROVAL_TIMEOUT, ProposalService};
pub use store::{PROPOSALS_NAMESPACE, ProposalStore};
