//! Domain root and policy accessors.
//!
//! Domain dispatch is a `match` over the closed [`Domain`] enum; unknown
//! domains fall through to "no roots, soft policy".

use scopeward_core::{Domain, Policy, RootPath, normalize_root};
use tracing::warn;

use crate::types::{Config, DomainSection};

fn domain_section<'a>(config: &'a Config, domain: &Domain) -> Option<&'a DomainSection> {
    match domain {
        Domain::Story => config.domains.story.as_ref(),
        Domain::Unknown(_) => None,
    }
}

/// Normalize and de-duplicate a configured root list, preserving order.
///
/// Roots are validated at load time; anything that still fails here is
/// skipped with a warning rather than widening scope.
pub(crate) fn normalize_roots(raw_roots: &[String]) -> Vec<RootPath> {
    let mut roots: Vec<RootPath> = Vec::with_capacity(raw_roots.len());
    for raw in raw_roots {
        match normalize_root(raw) {
            Ok(root) => {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            },
            Err(e) => warn!(root = %raw, error = %e, "Ignoring invalid root"),
        }
    }
    roots
}

/// Configured roots for `domain`; empty when the domain has none.
#[must_use]
pub fn domain_roots_from_config(config: &Config, domain: &Domain) -> Vec<RootPath> {
    domain_section(config, domain)
        .map(|section| normalize_roots(&section.roots))
        .unwrap_or_default()
}

/// Configured policy for `domain`; [`Policy::Soft`] when unset.
#[must_use]
pub fn domain_policy_from_config(config: &Config, domain: &Domain) -> Policy {
    domain_section(config, domain)
        .map(|section| section.policy)
        .unwrap_or_default()
}

/// Roots of the `story` domain.
#[must_use]
pub fn story_roots_from_config(config: &Config) -> Vec<RootPath> {
    domain_roots_from_config(config, &Domain::Story)
}

/// Policy of the `story` domain.
#[must_use]
pub fn story_scope_policy_from_config(config: &Config) -> Policy {
    domain_policy_from_config(config, &Domain::Story)
}
