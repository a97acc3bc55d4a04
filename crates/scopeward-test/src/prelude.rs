//! Prelude module - commonly used test utilities.
//!
//! Use `use scopeward_test::prelude::*;` to import all essential helpers.

pub use crate::fixtures::{
    file_patch, loop_config, story_config, test_proposal, test_token, unified_diff,
};
pub use crate::harness::{TestHarness, setup_test_logging};
pub use crate::mocks::{
    FailingKvStore, MockApprovalResolver, MockOverrideStatus, ScriptedApproval,
};
