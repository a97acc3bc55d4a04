//! Prelude module - commonly used types for convenient import.
//!
//! Use `use scopeward_proposals::prelude::*;` to import all essential types.

// Records
pub use crate::{Proposal, ProposalStatus, TransitionOutcome};

// Lifecycle
pub use crate::{ProposalService, ProposalStore};

// Approval
pub use crate::{ApprovalResolution, ApprovalResolver, ApprovalVerb};

// Diffs
pub use crate::{DiffFileEntry, ParsedDiff, parse_proposal_unified_diff};

// Errors
pub use crate::{ProposalError, ProposalResult};
