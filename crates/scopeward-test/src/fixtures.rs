//! Test fixtures for common types.

use std::fmt::Write as _;

use scopeward_config::{Config, DomainSection};
use scopeward_core::{Domain, Policy, RelPath, Token};
use scopeward_proposals::Proposal;

/// A configuration with only the `story` domain set.
#[must_use]
pub fn story_config(roots: &[&str], policy: Policy) -> Config {
    let mut config = Config::default();
    config.domains.story = Some(DomainSection {
        roots: roots.iter().map(|r| (*r).to_owned()).collect(),
        policy,
    });
    config
}

/// A configuration with no domains, reading loop files from `directory`.
#[must_use]
pub fn loop_config(directory: &str) -> Config {
    let mut config = Config::default();
    directory.clone_into(&mut config.loops.directory);
    config
}

/// A token from a non-empty literal.
///
/// # Panics
///
/// Panics if `raw` is blank.
#[must_use]
pub fn test_token(raw: &str) -> Token {
    Token::parse(raw).expect("non-empty token")
}

/// A one-hunk patch for `path` replacing `old` with `new`.
#[must_use]
pub fn file_patch(path: &str, old: &str, new: &str) -> String {
    format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1 +1 @@\n-{old}\n+{new}\n")
}

/// A combined diff with one single-line change per path.
#[must_use]
pub fn unified_diff(paths: &[&str]) -> String {
    let mut out = String::new();
    for path in paths {
        let _ = write!(out, "{}", file_patch(path, "before", "after"));
    }
    out
}

/// A pending story-domain proposal declaring and changing `paths`.
///
/// # Panics
///
/// Panics if a path is not a valid repository-relative path.
#[must_use]
pub fn test_proposal(paths: &[&str]) -> Proposal {
    let files = paths
        .iter()
        .map(|p| RelPath::parse(p).expect("valid proposal path"))
        .collect();
    Proposal::pending(unified_diff(paths), files).with_domain(Some(Domain::Story))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff_parses_per_file() {
        let proposal = test_proposal(&["a.ts", "b.ts"]);
        let parsed = proposal.parsed_diff();
        assert!(!parsed.is_degraded());
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.file("b.ts").unwrap().additions, 1);
    }

    #[test]
    fn test_story_config_sets_policy() {
        let config = story_config(&["content/story"], Policy::Hard);
        let story = config.domains.story.unwrap();
        assert_eq!(story.policy, Policy::Hard);
        assert_eq!(story.roots, vec!["content/story"]);
    }
}
