#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Repository configuration for Scopeward.
//!
//! This crate provides a single typed [`Config`], validated once at load
//! time, plus the resolvers the scope guard consults on every request:
//!
//! - [`domain_roots_from_config`] / [`domain_policy_from_config`] for
//!   per-domain roots and the soft/hard policy switch
//! - [`LoopRootsProvider`] for the directories of an active work loop
//! - [`ConfigProvider`] so callers can re-read settings per request
//!
//! # Usage
//!
//! ```rust,no_run
//! use scopeward_config::{Config, story_roots_from_config};
//!
//! let config = Config::load(std::path::Path::new(".")).unwrap();
//! for root in story_roots_from_config(&config) {
//!     println!("story root: {root}");
//! }
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Repository** (`{repo}/.scopeward/config.toml`)
//! 2. **Environment variables** (`SCOPEWARD_LOG_*`), as a fallback only
//! 3. **Embedded defaults** (`defaults.toml` compiled into binary)

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Work-loop root resolution.
pub mod loops;
/// Layered configuration merging.
pub mod merge;
/// Per-request configuration providers.
pub mod provider;
/// Domain root and policy accessors.
pub mod roots;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

use std::path::Path;

pub use error::{ConfigError, ConfigResult};
pub use loops::{FileLoopRoots, LoopRootsProvider, ScopeKind};
pub use provider::{ConfigProvider, RepoConfigProvider, StaticConfigProvider};
pub use roots::{
    domain_policy_from_config, domain_roots_from_config, story_roots_from_config,
    story_scope_policy_from_config,
};
pub use types::*;

impl Config {
    /// Load configuration for the repository at `repo_root`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the repository config is malformed or
    /// fails validation.
    pub fn load(repo_root: &Path) -> ConfigResult<Self> {
        loader::load(repo_root)
    }

    /// Parse and validate a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if parsing or validation fails.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::from_toml_str(content)
    }
}
