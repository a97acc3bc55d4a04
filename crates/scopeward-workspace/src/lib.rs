//! Scopeward Workspace - the scope guard.
//!
//! Before any mutation touches the repository, callers ask the
//! [`ScopeGuard`] whether the paths involved fall under the roots allowed
//! for the request's domain, work loop, and scope override:
//!
//! ```rust,no_run
//! # async fn example() {
//! use scopeward_workspace::{Operation, ScopeGuard, ScopeRequest};
//!
//! let guard = ScopeGuard::for_repo("/path/to/repo");
//! let request = ScopeRequest::from_raw(
//!     "story-page-save",
//!     &["content/story/ch1.md"],
//!     Some("story"),
//!     None,
//!     None,
//! );
//! let verdict = guard.enforce(&request).await;
//! if !verdict.ok {
//!     eprintln!("{}", verdict.message.unwrap_or_default());
//! }
//! # let _ = Operation::FileWrite;
//! # }
//! ```
//!
//! Under a soft policy out-of-scope paths are reported but allowed. Under a
//! hard policy they block. Paths that escape the repository always block.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod guard;
pub mod overrides;
pub mod request;
pub mod verdict;

pub use error::{ScopeError, ScopeResult};
pub use guard::ScopeGuard;
pub use overrides::{
    NoOverrides, OverrideGrant, OverrideLookupError, OverrideStatus, OverrideStatusProvider,
};
pub use request::{Operation, ScopeRequest};
pub use verdict::{RejectedPath, ScopeGuardContext, ScopeGuardVerdict};
