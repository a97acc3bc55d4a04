//! Scopeward Core - Foundation types shared by the scope guard and the
//! proposal lifecycle.
//!
//! This crate provides:
//! - Repository-relative path normalization and containment checks
//! - The closed [`Domain`] enum and the [`Policy`] switch
//! - Opaque identifiers for proposals, work loops and tokens
//!
//! It has no dependencies on other internal crates.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod paths;
pub mod types;

pub use error::{PathError, PathResult};
pub use paths::{
    REPO_ROOT, RelPath, RootPath, is_path_within_roots, normalize_rel_path, normalize_root,
    relativize,
};
pub use types::{Domain, LoopId, Policy, ProposalId, Token};
