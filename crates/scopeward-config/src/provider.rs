//! Configuration providers.
//!
//! The scope guard asks a [`ConfigProvider`] for the configuration on every
//! request. Settings are owned by an external component and may change at
//! any time, so providers must not hand out stale snapshots.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::ConfigResult;
use crate::loader;
use crate::types::Config;

/// Source of the current repository configuration.
pub trait ConfigProvider: Send + Sync {
    /// Read the current configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::ConfigError) if the configuration
    /// cannot be read or is invalid.
    fn read_repo_config(&self) -> ConfigResult<Config>;
}

/// Reads `{repo}/.scopeward/config.toml` on every call.
#[derive(Debug, Clone)]
pub struct RepoConfigProvider {
    repo_root: PathBuf,
}

impl RepoConfigProvider {
    /// Create a provider for the repository at `repo_root`.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// The repository root this provider reads from.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

impl ConfigProvider for RepoConfigProvider {
    fn read_repo_config(&self) -> ConfigResult<Config> {
        loader::load(&self.repo_root)
    }
}

/// In-memory configuration that can be swapped at runtime.
///
/// Useful for embedding callers that manage settings themselves, and for
/// tests that tighten policy between requests.
pub struct StaticConfigProvider {
    config: RwLock<Config>,
}

impl StaticConfigProvider {
    /// Wrap a configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the configuration seen by subsequent reads.
    pub fn replace(&self, config: Config) {
        let mut guard = self.config.write().unwrap_or_else(|e| {
            tracing::warn!("StaticConfigProvider lock poisoned, recovering");
            e.into_inner()
        });
        *guard = config;
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn read_repo_config(&self) -> ConfigResult<Config> {
        let guard = self.config.read().unwrap_or_else(|e| {
            tracing::warn!("StaticConfigProvider lock poisoned, recovering");
            e.into_inner()
        });
        Ok(guard.clone())
    }
}

impl fmt::Debug for StaticConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticConfigProvider").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DomainSection;
    use scopeward_core::Policy;

    #[test]
    fn test_static_provider_replace() {
        let provider = StaticConfigProvider::new(Config::default());
        assert!(provider.read_repo_config().unwrap().domains.story.is_none());

        let mut tightened = Config::default();
        tightened.domains.story = Some(DomainSection {
            roots: vec!["content".to_owned()],
            policy: Policy::Hard,
        });
        provider.replace(tightened);

        let story = provider.read_repo_config().unwrap().domains.story.unwrap();
        assert_eq!(story.policy, Policy::Hard);
    }

    #[test]
    fn test_repo_provider_rereads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = RepoConfigProvider::new(dir.path());
        assert!(provider.read_repo_config().unwrap().domains.story.is_none());

        let path = loader::repo_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[domains.story]\nroots = [\"content\"]\n").unwrap();

        assert!(provider.read_repo_config().unwrap().domains.story.is_some());
    }
}
