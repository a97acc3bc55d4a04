//! Caller-facing proposal lifecycle.
//!
//! Apply re-checks the proposal's recorded scope against the current policy
//! before anything changes. Approval-gated proposals are confirmed through
//! the [`ApprovalResolver`] under a deadline, and the local record only moves
//! once the resolver agrees. A proposal that fails any check stays pending.

use std::sync::Arc;
use std::time::Duration;

use scopeward_config::Config;
use scopeward_core::{ProposalId, Token};
use scopeward_telemetry::RequestContext;
use scopeward_workspace::{Operation, ScopeGuard, ScopeRequest};
use tracing::{Instrument, debug, info, warn};

use crate::approval::{ApprovalResolver, ApprovalVerb, NoApprovalResolver};
use crate::diff::{DiffFileEntry, ParsedDiff};
use crate::error::{ProposalError, ProposalResult};
use crate::proposal::{Proposal, TransitionOutcome};
use crate::store::ProposalStore;

/// Default deadline for one approval resolver call.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Applies, rejects and previews stored proposals.
#[derive(Clone)]
pub struct ProposalService {
    store: ProposalStore,
    guard: ScopeGuard,
    approvals: Arc<dyn ApprovalResolver>,
    approval_timeout: Duration,
}

impl std::fmt::Debug for ProposalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposalService")
            .field("store", &self.store)
            .field("guard", &self.guard)
            .field("approval_timeout", &self.approval_timeout)
            .finish_non_exhaustive()
    }
}

impl ProposalService {
    /// Create a service that refuses approval-gated proposals.
    #[must_use]
    pub fn new(store: ProposalStore, guard: ScopeGuard) -> Self {
        Self {
            store,
            guard,
            approvals: Arc::new(NoApprovalResolver),
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    /// Route approval-gated proposals through `resolver`.
    #[must_use]
    pub fn with_approval_resolver(mut self, resolver: Arc<dyn ApprovalResolver>) -> Self {
        self.approvals = resolver;
        self
    }

    /// Set the resolver deadline.
    #[must_use]
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Take the resolver deadline from `config`.
    #[must_use]
    pub fn with_config(self, config: &Config) -> Self {
        let timeout = Duration::from_secs(config.proposals.approval_timeout_secs);
        self.with_approval_timeout(timeout)
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &ProposalStore {
        &self.store
    }

    /// Apply a pending proposal.
    ///
    /// # Errors
    ///
    /// - [`ProposalError::NotFound`] for unknown ids
    /// - [`ProposalError::PolicyBlocked`] when the recorded scope is no
    ///   longer allowed
    /// - [`ProposalError::ApprovalResolutionFailed`] when the resolver
    ///   refuses, errors, or times out
    /// - [`ProposalError::StoreUnavailable`] on storage outages
    pub async fn apply(&self, id: &ProposalId) -> ProposalResult<TransitionOutcome> {
        let ctx = RequestContext::new("proposals")
            .with_operation("apply")
            .with_subject(id.as_str());
        self.decide(id, ApprovalVerb::Approve, &ctx)
            .instrument(ctx.span())
            .await
    }

    /// Reject a pending proposal.
    ///
    /// # Errors
    ///
    /// As [`apply`](Self::apply).
    pub async fn reject(&self, id: &ProposalId) -> ProposalResult<TransitionOutcome> {
        let ctx = RequestContext::new("proposals")
            .with_operation("reject")
            .with_subject(id.as_str());
        self.decide(id, ApprovalVerb::Reject, &ctx)
            .instrument(ctx.span())
            .await
    }

    /// Split a proposal's diff into per-file entries.
    ///
    /// # Errors
    ///
    /// [`ProposalError::NotFound`] for unknown ids, or a storage error.
    pub async fn diff(&self, id: &ProposalId) -> ProposalResult<ParsedDiff> {
        let proposal = self.load(id).await?;
        let parsed = proposal.parsed_diff();
        if parsed.is_degraded() {
            debug!(proposal_id = %id, warnings = ?parsed.warnings, "Proposal diff degraded");
        }
        Ok(parsed)
    }

    /// The diff entry for one file of a proposal.
    ///
    /// # Errors
    ///
    /// [`ProposalError::FileNotInProposal`] when the proposal has no entry
    /// for `path`, [`ProposalError::NotFound`] for unknown ids, or a storage
    /// error.
    pub async fn file_diff(&self, id: &ProposalId, path: &str) -> ProposalResult<DiffFileEntry> {
        let parsed = self.diff(id).await?;
        parsed
            .file(path)
            .cloned()
            .ok_or_else(|| ProposalError::FileNotInProposal {
                id: id.clone(),
                path: path.to_owned(),
            })
    }

    async fn load(&self, id: &ProposalId) -> ProposalResult<Proposal> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ProposalError::NotFound(id.clone()))
    }

    async fn decide(
        &self,
        id: &ProposalId,
        verb: ApprovalVerb,
        ctx: &RequestContext,
    ) -> ProposalResult<TransitionOutcome> {
        let proposal = self.load(id).await?;
        if proposal.status.is_terminal() {
            debug!(status = %proposal.status, "Proposal already decided");
            return Ok(TransitionOutcome::already(proposal));
        }

        self.check_scope(&proposal, verb).await?;

        if let Some(token) = &proposal.approval_token {
            self.confirm(token, verb, ctx).await?;
            info!(verb = %verb, "Approval confirmed");
        }

        // The resolver may already have recorded the decision; the store
        // re-reads and reports a no-op in that case.
        match verb {
            ApprovalVerb::Approve => self.store.mark_applied(id).await,
            ApprovalVerb::Reject => self.store.mark_rejected(id).await,
        }
    }

    async fn check_scope(&self, proposal: &Proposal, verb: ApprovalVerb) -> ProposalResult<()> {
        let operation = match verb {
            ApprovalVerb::Approve => Operation::ProposalApply,
            ApprovalVerb::Reject => Operation::ProposalReject,
        };
        let request = ScopeRequest::new(operation)
            .with_paths(proposal.touched_paths())
            .with_domain(proposal.domain.clone())
            .with_loop(proposal.loop_id.clone())
            .with_override_token(proposal.scope_override_token.clone());

        let verdict = self.guard.enforce(&request).await;
        if !verdict.ok {
            warn!(
                out_of_scope = verdict.out_of_scope.len(),
                rejected = verdict.rejected.len(),
                "Proposal blocked by scope policy"
            );
            return Err(ProposalError::PolicyBlocked(Box::new(verdict)));
        }
        if let Some(message) = verdict.message.as_deref() {
            info!(advisory = message, "Scope advisory for proposal");
        }
        Ok(())
    }

    async fn confirm(
        &self,
        token: &Token,
        verb: ApprovalVerb,
        ctx: &RequestContext,
    ) -> ProposalResult<()> {
        let approval = ctx.child("approval").with_operation(verb.to_string());
        let call = self
            .approvals
            .resolve_approval(token, verb)
            .instrument(approval.span());
        let answer = tokio::time::timeout(self.approval_timeout, call).await;
        debug!(elapsed_ms = approval.elapsed_ms(), "Approval resolver returned");
        let resolution = match answer {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => {
                warn!(token = %token, error = %e, "Approval resolver failed");
                return Err(ProposalError::ApprovalResolutionFailed {
                    message: e.to_string(),
                });
            },
            Err(_) => {
                warn!(
                    token = %token,
                    timeout_ms = u64::try_from(self.approval_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Approval resolver timed out"
                );
                return Err(ProposalError::ApprovalResolutionFailed {
                    message: format!(
                        "approval resolver did not answer within {:?}",
                        self.approval_timeout
                    ),
                });
            },
        };

        if resolution.ok {
            Ok(())
        } else {
            let message = resolution
                .message
                .unwrap_or_else(|| format!("approval to {verb} was refused"));
            warn!(token = %token, reason = %message, "Approval refused");
            Err(ProposalError::ApprovalResolutionFailed { message })
        }
    }
}
