//! Scopeward Test - Shared test utilities.
//!
//! Mock collaborators and fixtures for exercising the scope guard and the
//! proposal lifecycle without a real approval service or storage backend.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! scopeward-test.workspace = true
//! ```
//!
//! Then use in integration tests:
//!
//! ```rust,ignore
//! use scopeward_core::Policy;
//! use scopeward_test::{TestHarness, story_config};
//!
//! #[tokio::test]
//! async fn test_apply_flow() {
//!     let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
//!     let proposal = harness.insert_story_proposal("content/story/p1.md").await;
//!
//!     let outcome = harness.service.apply(&proposal.id).await.unwrap();
//!     assert!(!outcome.noop);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
