//! Work-loop root resolution.
//!
//! A work loop is an active unit of iterative work with its own directories.
//! [`FileLoopRoots`] keeps one TOML file per loop under the configured loops
//! directory:
//!
//! ```toml
//! # .scopeward/loops/refactor-parser.toml
//! roots = ["crates/parser"]
//! read_roots = ["crates", "docs"]
//! ```
//!
//! `read_roots` is optional and falls back to `roots`.

use std::fmt;
use std::path::{Path, PathBuf};

use scopeward_core::{LoopId, RootPath};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::roots::normalize_roots;
use crate::types::{Config, LoopsSection};

/// Maximum accepted loop id length.
const MAX_LOOP_ID_LEN: usize = 128;

/// Which kind of access the roots are resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Writes, saves, and applies.
    Write,
    /// Searches and other reads.
    Read,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// Resolves the directories associated with an active work loop.
pub trait LoopRootsProvider: Send + Sync {
    /// Roots for `loop_id`; empty when the id is absent or unknown.
    fn list_scope_roots(
        &self,
        repo_root: &Path,
        kind: ScopeKind,
        loop_id: Option<&LoopId>,
    ) -> Vec<RootPath>;

    /// Roots for `loop_id` while serving a request under `config`.
    ///
    /// Providers whose layout comes from the configuration read it here;
    /// the default ignores it.
    fn list_configured_scope_roots(
        &self,
        repo_root: &Path,
        _config: &Config,
        kind: ScopeKind,
        loop_id: Option<&LoopId>,
    ) -> Vec<RootPath> {
        self.list_scope_roots(repo_root, kind, loop_id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoopScopeFile {
    roots: Vec<String>,
    read_roots: Option<Vec<String>>,
}

/// Reads `{repo}/{directory}/{loop_id}.toml`.
///
/// A [`configured`](Self::configured) provider takes `directory` from the
/// `loops` section of each request's configuration.
#[derive(Debug, Clone, Default)]
pub struct FileLoopRoots {
    directory: Option<PathBuf>,
}

impl FileLoopRoots {
    /// Create a provider reading loops from a fixed `directory`
    /// (repository-relative).
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
        }
    }

    /// Create a provider that follows `loops.directory`.
    #[must_use]
    pub fn configured() -> Self {
        Self::default()
    }

    fn loop_file(directory: &Path, repo_root: &Path, loop_id: &LoopId) -> Option<PathBuf> {
        let id = loop_id.as_str();
        let valid = id.len() <= MAX_LOOP_ID_LEN
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            warn!(loop_id = %id, "Rejecting malformed loop id");
            return None;
        }
        Some(repo_root.join(directory).join(format!("{id}.toml")))
    }

    fn read_roots(
        &self,
        repo_root: &Path,
        configured: &str,
        kind: ScopeKind,
        loop_id: Option<&LoopId>,
    ) -> Vec<RootPath> {
        let Some(loop_id) = loop_id else {
            return Vec::new();
        };
        let directory = self
            .directory
            .as_deref()
            .unwrap_or_else(|| Path::new(configured));
        let Some(path) = Self::loop_file(directory, repo_root, loop_id) else {
            return Vec::new();
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(loop_id = %loop_id, "Unknown work loop");
                return Vec::new();
            },
            Err(e) => {
                warn!(loop_id = %loop_id, error = %e, "Failed to read loop scope file");
                return Vec::new();
            },
        };

        let file: LoopScopeFile = match toml::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!(loop_id = %loop_id, error = %e, "Malformed loop scope file");
                return Vec::new();
            },
        };

        let raw = match kind {
            ScopeKind::Write => &file.roots,
            ScopeKind::Read => file.read_roots.as_ref().unwrap_or(&file.roots),
        };
        normalize_roots(raw)
    }
}

impl LoopRootsProvider for FileLoopRoots {
    fn list_scope_roots(
        &self,
        repo_root: &Path,
        kind: ScopeKind,
        loop_id: Option<&LoopId>,
    ) -> Vec<RootPath> {
        let defaults = LoopsSection::default();
        self.read_roots(repo_root, &defaults.directory, kind, loop_id)
    }

    fn list_configured_scope_roots(
        &self,
        repo_root: &Path,
        config: &Config,
        kind: ScopeKind,
        loop_id: Option<&LoopId>,
    ) -> Vec<RootPath> {
        self.read_roots(repo_root, &config.loops.directory, kind, loop_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(loop_id: &str, content: &str) -> (TempDir, FileLoopRoots) {
        let dir = TempDir::new().unwrap();
        let loops = dir.path().join(".scopeward/loops");
        std::fs::create_dir_all(&loops).unwrap();
        std::fs::write(loops.join(format!("{loop_id}.toml")), content).unwrap();
        (dir, FileLoopRoots::configured())
    }

    fn names(roots: &[RootPath]) -> Vec<&str> {
        roots.iter().map(RootPath::as_str).collect()
    }

    #[test]
    fn test_absent_loop_id_is_empty() {
        let (dir, provider) = setup("l1", "roots = [\"src\"]");
        assert!(
            provider
                .list_scope_roots(dir.path(), ScopeKind::Write, None)
                .is_empty()
        );
    }

    #[test]
    fn test_write_and_read_roots() {
        let (dir, provider) = setup("l1", "roots = [\"src/feature\"]\nread_roots = [\"src\", \"docs\"]");
        let id = LoopId::parse("l1").unwrap();
        assert_eq!(
            names(&provider.list_scope_roots(dir.path(), ScopeKind::Write, Some(&id))),
            vec!["src/feature"]
        );
        assert_eq!(
            names(&provider.list_scope_roots(dir.path(), ScopeKind::Read, Some(&id))),
            vec!["src", "docs"]
        );
    }

    #[test]
    fn test_read_falls_back_to_roots() {
        let (dir, provider) = setup("l2", "roots = [\"./lib/\"]");
        let id = LoopId::parse("l2").unwrap();
        assert_eq!(
            names(&provider.list_scope_roots(dir.path(), ScopeKind::Read, Some(&id))),
            vec!["lib"]
        );
    }

    #[test]
    fn test_unknown_loop_is_empty() {
        let (dir, provider) = setup("l1", "roots = [\"src\"]");
        let id = LoopId::parse("missing").unwrap();
        assert!(
            provider
                .list_scope_roots(dir.path(), ScopeKind::Write, Some(&id))
                .is_empty()
        );
    }

    #[test]
    fn test_traversal_loop_id_rejected() {
        let (dir, provider) = setup("l1", "roots = [\"src\"]");
        for raw in ["../l1", "a/b", "..", ".hidden"] {
            let id = LoopId::parse(raw).unwrap();
            assert!(
                provider
                    .list_scope_roots(dir.path(), ScopeKind::Write, Some(&id))
                    .is_empty()
            );
        }
    }

    #[test]
    fn test_malformed_loop_file_is_empty() {
        let (dir, provider) = setup("bad", "roots = [");
        let id = LoopId::parse("bad").unwrap();
        assert!(
            provider
                .list_scope_roots(dir.path(), ScopeKind::Write, Some(&id))
                .is_empty()
        );
    }

    #[test]
    fn test_configured_provider_follows_config_directory() {
        let (dir, provider) = setup("l1", "roots = [\"src\"]");
        let other = dir.path().join("work/loops");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("l1.toml"), "roots = [\"lib\"]").unwrap();
        let id = LoopId::parse("l1").unwrap();

        let mut config = Config::default();
        assert_eq!(
            names(&provider.list_configured_scope_roots(dir.path(), &config, ScopeKind::Write, Some(&id))),
            vec!["src"]
        );
        config.loops.directory = "work/loops".to_owned();
        assert_eq!(
            names(&provider.list_configured_scope_roots(dir.path(), &config, ScopeKind::Write, Some(&id))),
            vec!["lib"]
        );
    }

    #[test]
    fn test_fixed_directory_ignores_config() {
        let (dir, _) = setup("l1", "roots = [\"src\"]");
        let provider = FileLoopRoots::new(".scopeward/loops");
        let mut config = Config::default();
        config.loops.directory = "elsewhere".to_owned();
        let id = LoopId::parse("l1").unwrap();
        assert_eq!(
            names(&provider.list_configured_scope_roots(dir.path(), &config, ScopeKind::Write, Some(&id))),
            vec!["src"]
        );
    }
}
