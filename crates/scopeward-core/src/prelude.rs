//! Prelude module - commonly used types for convenient import.
//!
//! Use `use scopeward_core::prelude::*;` to import all essential types.

// Paths
pub use crate::{RelPath, RootPath, is_path_within_roots, normalize_rel_path, normalize_root};

// Identifiers and policy
pub use crate::{Domain, LoopId, Policy, ProposalId, Token};

// Errors
pub use crate::{PathError, PathResult};
