//! Configuration types for a Scopeward-managed repository.
//!
//! Every struct implements [`Default`] so that a bare `[section]` header in
//! TOML produces a working configuration. Root lists are kept as written and
//! checked by [`validate`](crate::validate::validate) at load time; the
//! accessors in [`roots`](crate::roots) hand out normalized values.

use scopeward_core::Policy;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration, loaded from embedded defaults overlaid with
/// `{repo}/.scopeward/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-domain root directories and policy.
    pub domains: DomainsSection,
    /// Where work-loop scope files live.
    pub loops: LoopsSection,
    /// Proposal lifecycle knobs.
    pub proposals: ProposalsSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// DomainsSection
// ---------------------------------------------------------------------------

/// One optional section per known domain.
///
/// Unknown keys are rejected so a misspelt domain fails at load time
/// instead of silently granting nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DomainsSection {
    /// The `story` domain.
    pub story: Option<DomainSection>,
}

/// Roots and policy for a single domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSection {
    /// Repository-relative directories the domain may touch. `"."` means
    /// the whole repository.
    pub roots: Vec<String>,
    /// `soft` reports violations; `hard` blocks them.
    pub policy: Policy,
}

// ---------------------------------------------------------------------------
// LoopsSection
// ---------------------------------------------------------------------------

/// Location of work-loop scope files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopsSection {
    /// Directory, relative to the repository root, holding one
    /// `{loop_id}.toml` per active loop.
    pub directory: String,
}

impl Default for LoopsSection {
    fn default() -> Self {
        Self {
            directory: ".scopeward/loops".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProposalsSection
// ---------------------------------------------------------------------------

/// Proposal lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalsSection {
    /// Deadline for a single call to the external approval resolver.
    pub approval_timeout_secs: u64,
}

impl Default for ProposalsSection {
    fn default() -> Self {
        Self {
            approval_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"` (human-friendly), `"compact"` (one-line),
    /// `"json"` (structured), or `"full"` (verbose).
    pub format: String,
    /// Per-crate tracing directives (e.g. `["scopeward_workspace=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
