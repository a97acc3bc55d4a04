//! Proposal records.

use std::fmt;

use chrono::{DateTime, Utc};
use scopeward_core::{Domain, LoopId, ProposalId, RelPath, Token};
use serde::{Deserialize, Serialize};

use crate::diff::{ParsedDiff, parse_proposal_unified_diff};

/// Lifecycle state of a proposal.
///
/// `Pending` moves to exactly one of the other three, which never change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Awaiting a decision.
    #[default]
    Pending,
    /// Applied to the repository.
    Applied,
    /// Rejected by a reviewer.
    Rejected,
    /// The executor failed while applying.
    Failed,
}

impl ProposalStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Applied => write!(f, "applied"),
            Self::Rejected => write!(f, "rejected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One batch of agent-authored changes awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Stable identifier.
    pub id: ProposalId,
    /// Current state.
    pub status: ProposalStatus,
    /// Combined unified diff over all touched files.
    pub diff: String,
    /// Declared touched paths.
    #[serde(default)]
    pub files: Vec<RelPath>,
    /// Domain the proposal was created under.
    #[serde(default)]
    pub domain: Option<Domain>,
    /// Work loop the proposal was created under.
    #[serde(default)]
    pub loop_id: Option<LoopId>,
    /// When set, transitions go through the approval resolver.
    #[serde(default)]
    pub approval_token: Option<Token>,
    /// Scope override presented when applying.
    #[serde(default)]
    pub scope_override_token: Option<Token>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last write.
    pub updated_at: DateTime<Utc>,
    /// Time the proposal reached a terminal state.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Executor error for [`ProposalStatus::Failed`].
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl Proposal {
    /// A new pending proposal with a fresh id.
    #[must_use]
    pub fn pending(diff: impl Into<String>, files: Vec<RelPath>) -> Self {
        let now = Utc::now();
        Self {
            id: ProposalId::new(),
            status: ProposalStatus::Pending,
            diff: diff.into(),
            files,
            domain: None,
            loop_id: None,
            approval_token: None,
            scope_override_token: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            failure_reason: None,
        }
    }

    /// Use a specific id.
    #[must_use]
    pub fn with_id(mut self, id: ProposalId) -> Self {
        self.id = id;
        self
    }

    /// Set the domain.
    #[must_use]
    pub fn with_domain(mut self, domain: Option<Domain>) -> Self {
        self.domain = domain;
        self
    }

    /// Set the work loop.
    #[must_use]
    pub fn with_loop(mut self, loop_id: Option<LoopId>) -> Self {
        self.loop_id = loop_id;
        self
    }

    /// Require approval through the resolver.
    #[must_use]
    pub fn with_approval_token(mut self, token: Option<Token>) -> Self {
        self.approval_token = token;
        self
    }

    /// Attach a scope override.
    #[must_use]
    pub fn with_scope_override_token(mut self, token: Option<Token>) -> Self {
        self.scope_override_token = token;
        self
    }

    /// Split the diff, falling back to the declared files.
    #[must_use]
    pub fn parsed_diff(&self) -> ParsedDiff {
        parse_proposal_unified_diff(&self.diff, &self.files)
    }

    /// Every path the proposal may touch: declared files, files named in the
    /// diff, the old side of renames and copies, and raw diff paths that
    /// failed normalization.
    #[must_use]
    pub fn touched_paths(&self) -> Vec<String> {
        let parsed = self.parsed_diff();
        let mut paths: Vec<String> = Vec::new();
        let candidates = self
            .files
            .iter()
            .chain(parsed.paths())
            .chain(parsed.source_paths.iter())
            .map(|p| p.as_str().to_owned())
            .chain(parsed.invalid_paths.iter().cloned());
        for path in candidates {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    pub(crate) fn transitioned(&self, status: ProposalStatus, reason: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            status,
            updated_at: now,
            resolved_at: Some(now),
            failure_reason: reason,
            ..self.clone()
        }
    }
}

/// Result of a transition request.
///
/// Transitions never fail because the proposal is already terminal; they
/// report `noop` instead, so a retried click is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// Always `true`; failures are errors.
    pub ok: bool,
    /// `true` when the proposal was already terminal and nothing changed.
    pub noop: bool,
    /// The proposal after the call.
    pub proposal: Proposal,
    /// Set for no-ops.
    pub message: Option<String>,
}

impl TransitionOutcome {
    pub(crate) fn changed(proposal: Proposal) -> Self {
        Self {
            ok: true,
            noop: false,
            proposal,
            message: None,
        }
    }

    pub(crate) fn already(proposal: Proposal) -> Self {
        let message = format!("proposal {} is already {}", proposal.id, proposal.status);
        Self {
            ok: true,
            noop: true,
            proposal,
            message: Some(message),
        }
    }
}
