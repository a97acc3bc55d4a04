//! Prelude module - commonly used types for convenient import.
//!
//! Use `use scopeward_workspace::prelude::*;` to import all essential types.

// Guard
pub use crate::{ScopeGuard, ScopeRequest, Operation};

// Outcomes
pub use crate::{RejectedPath, ScopeGuardContext, ScopeGuardVerdict};

// Overrides
pub use crate::{NoOverrides, OverrideStatus, OverrideStatusProvider};

// Errors
pub use crate::{ScopeError, ScopeResult};
