//! Resolved scope contexts and guard verdicts.

use std::fmt::Write as _;

use scopeward_core::{Domain, LoopId, PathError, Policy, RelPath, RootPath};
use serde::{Deserialize, Serialize};

use crate::request::Operation;

/// The roots and policy in force for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeGuardContext {
    /// Domain of the request.
    pub domain: Option<Domain>,
    /// Policy configured for the domain ([`Policy::Soft`] without one).
    pub policy: Policy,
    /// Union of every root that admits a path. Never empty once resolved.
    pub allowed_roots: Vec<RootPath>,
    /// Roots configured for the domain.
    pub domain_roots: Vec<RootPath>,
    /// Roots of the work loop, consulted only when the domain has none.
    pub loop_roots: Vec<RootPath>,
    /// Work loop of the request.
    pub loop_id: Option<LoopId>,
    /// Whether the request presented an override token.
    pub override_presented: bool,
    /// Whether that token is currently active for the domain.
    pub override_active: bool,
    /// Roots granted by the active override.
    pub override_roots: Vec<RootPath>,
}

impl ScopeGuardContext {
    /// Whether `path` falls under any allowed root.
    #[must_use]
    pub fn allows(&self, path: &RelPath) -> bool {
        path.is_within(&self.allowed_roots)
    }
}

/// A caller path that failed normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedPath {
    /// The path as supplied.
    pub path: String,
    /// Why it was rejected.
    pub reason: String,
}

impl From<&PathError> for RejectedPath {
    fn from(err: &PathError) -> Self {
        Self {
            path: err.raw_path().to_owned(),
            reason: err.to_string(),
        }
    }
}

/// Outcome of a scope guard evaluation.
///
/// `ok == false` means the caller must refuse the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeGuardVerdict {
    /// Whether the operation may proceed.
    pub ok: bool,
    /// True when there was nothing to check.
    pub skipped: bool,
    /// The operation that was evaluated.
    pub operation: Operation,
    /// Normalized paths outside every allowed root.
    pub out_of_scope: Vec<RelPath>,
    /// Paths that could not be normalized.
    pub rejected: Vec<RejectedPath>,
    /// Resolved context; `None` when skipped or unresolvable.
    pub context: Option<ScopeGuardContext>,
    /// Human-readable explanation for blocked or advisory outcomes.
    pub message: Option<String>,
}

impl ScopeGuardVerdict {
    /// Verdict for a request with no paths.
    #[must_use]
    pub fn skipped(operation: Operation) -> Self {
        Self {
            ok: true,
            skipped: true,
            operation,
            out_of_scope: Vec::new(),
            rejected: Vec::new(),
            context: None,
            message: None,
        }
    }

    /// Verdict for a request whose context could not be resolved.
    #[must_use]
    pub fn unavailable(operation: Operation, reason: &str) -> Self {
        let message = format!("{operation} blocked: scope configuration unavailable: {reason}");
        Self {
            ok: false,
            skipped: false,
            operation,
            out_of_scope: Vec::new(),
            rejected: Vec::new(),
            context: None,
            message: Some(message),
        }
    }

    /// Classify normalized and rejected paths against a resolved context.
    #[must_use]
    pub fn evaluate(
        operation: Operation,
        context: ScopeGuardContext,
        paths: &[RelPath],
        rejected: Vec<RejectedPath>,
    ) -> Self {
        let out_of_scope: Vec<RelPath> = paths
            .iter()
            .filter(|path| !context.allows(path))
            .cloned()
            .collect();

        let blocked_by_policy = context.policy.is_blocking() && !out_of_scope.is_empty();
        let ok = rejected.is_empty() && !blocked_by_policy;

        let message = if !rejected.is_empty() || blocked_by_policy {
            Some(blocked_message(&operation, &context, &out_of_scope, &rejected))
        } else if out_of_scope.is_empty() {
            None
        } else {
            Some(advisory_message(&operation, &context, &out_of_scope))
        };

        Self {
            ok,
            skipped: false,
            operation,
            out_of_scope,
            rejected,
            context: Some(context),
            message,
        }
    }

    /// Whether the verdict allowed the operation while reporting paths
    /// outside scope (soft policy).
    #[must_use]
    pub fn is_advisory(&self) -> bool {
        self.ok && !self.out_of_scope.is_empty()
    }
}

fn join<T: AsRef<str>>(items: &[T]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

fn roots_list(roots: &[RootPath]) -> String {
    if roots.is_empty() {
        "(none)".to_owned()
    } else {
        format!("[{}]", join(roots))
    }
}

fn domain_label(domain: Option<&Domain>) -> &str {
    domain.map_or("none", Domain::as_str)
}

fn blocked_message(
    operation: &Operation,
    context: &ScopeGuardContext,
    out_of_scope: &[RelPath],
    rejected: &[RejectedPath],
) -> String {
    let mut message = format!(
        "{operation} blocked by scope guard (domain: {}, policy: {}, allowed roots: {})",
        domain_label(context.domain.as_ref()),
        context.policy,
        roots_list(&context.allowed_roots),
    );

    if !rejected.is_empty() {
        let raw: Vec<&str> = rejected.iter().map(|r| r.path.as_str()).collect();
        let _ = write!(message, "; invalid paths: {}", join(&raw));
    }

    if !out_of_scope.is_empty() {
        let _ = write!(message, "; out of scope: {}", join(out_of_scope));
        let hint = if context.override_active {
            "the active scope override does not cover these paths, request a wider override"
        } else if context.override_presented {
            "the presented scope override is not active for this domain"
        } else {
            "request a scope override to widen the allowed roots"
        };
        let _ = write!(message, ". Hint: {hint}");
    }

    message
}

fn advisory_message(
    operation: &Operation,
    context: &ScopeGuardContext,
    out_of_scope: &[RelPath],
) -> String {
    format!(
        "{operation}: {} path(s) outside allowed roots {} (soft policy, not blocking): {}",
        out_of_scope.len(),
        roots_list(&context.allowed_roots),
        join(out_of_scope),
    )
}
