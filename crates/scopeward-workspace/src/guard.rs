//! The scope guard.
//!
//! Resolution order for the allowed roots of a request:
//!
//! 1. roots configured for the request's domain
//! 2. when those are empty and a work loop is named, the loop's roots
//! 3. when both are empty, the whole repository (`"."`)
//! 4. plus any roots granted by an active scope override
//!
//! Overrides only ever add roots. Configuration is re-read on every call.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scopeward_config::{
    Config, ConfigProvider, FileLoopRoots, LoopRootsProvider, RepoConfigProvider,
    domain_policy_from_config, domain_roots_from_config,
};
use scopeward_core::{Domain, Policy, RelPath, RootPath, Token, relativize};
use tracing::{debug, info, warn};

use crate::error::ScopeResult;
use crate::overrides::{NoOverrides, OverrideStatusProvider};
use crate::request::ScopeRequest;
use crate::verdict::{RejectedPath, ScopeGuardContext, ScopeGuardVerdict};

/// Gates mutations on a repository against its configured scope.
#[derive(Clone)]
pub struct ScopeGuard {
    repo_root: PathBuf,
    config: Arc<dyn ConfigProvider>,
    loops: Arc<dyn LoopRootsProvider>,
    overrides: Arc<dyn OverrideStatusProvider>,
}

impl ScopeGuard {
    /// Create a guard from explicit providers.
    #[must_use]
    pub fn new(
        repo_root: impl Into<PathBuf>,
        config: Arc<dyn ConfigProvider>,
        loops: Arc<dyn LoopRootsProvider>,
        overrides: Arc<dyn OverrideStatusProvider>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            config,
            loops,
            overrides,
        }
    }

    /// Create a guard reading `{repo}/.scopeward/config.toml` on every
    /// request, with file-backed work loops and no overrides.
    #[must_use]
    pub fn for_repo(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self::new(
            repo_root.clone(),
            Arc::new(RepoConfigProvider::new(repo_root)),
            Arc::new(FileLoopRoots::configured()),
            Arc::new(NoOverrides),
        )
    }

    /// Replace the override status provider.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Arc<dyn OverrideStatusProvider>) -> Self {
        self.overrides = overrides;
        self
    }

    /// The repository root paths are resolved against.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Resolve the roots and policy in force for `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read.
    pub async fn resolve_context(&self, request: &ScopeRequest) -> ScopeResult<ScopeGuardContext> {
        let config = self.config.read_repo_config()?;
        Ok(self.resolve_with_config(&config, request).await)
    }

    async fn resolve_with_config(
        &self,
        config: &Config,
        request: &ScopeRequest,
    ) -> ScopeGuardContext {
        let domain = request.domain.as_ref();
        let (domain_roots, policy) = match domain {
            Some(domain) => (
                domain_roots_from_config(config, domain),
                domain_policy_from_config(config, domain),
            ),
            None => (Vec::new(), Policy::default()),
        };

        let loop_roots = if domain_roots.is_empty() && request.loop_id.is_some() {
            self.loops.list_configured_scope_roots(
                &self.repo_root,
                config,
                request.operation.scope_kind(),
                request.loop_id.as_ref(),
            )
        } else {
            Vec::new()
        };

        let mut allowed_roots = if !domain_roots.is_empty() {
            domain_roots.clone()
        } else if !loop_roots.is_empty() {
            loop_roots.clone()
        } else {
            vec![RootPath::repo()]
        };

        let override_roots = match &request.override_token {
            Some(token) => self.active_override_roots(token, domain).await,
            None => Vec::new(),
        };
        for root in &override_roots {
            if !allowed_roots.contains(root) {
                allowed_roots.push(root.clone());
            }
        }

        ScopeGuardContext {
            domain: request.domain.clone(),
            policy,
            allowed_roots,
            domain_roots,
            loop_roots,
            loop_id: request.loop_id.clone(),
            override_presented: request.override_token.is_some(),
            override_active: !override_roots.is_empty(),
            override_roots,
        }
    }

    async fn active_override_roots(&self, token: &Token, domain: Option<&Domain>) -> Vec<RootPath> {
        match self.overrides.scope_override_status(token, domain).await {
            Ok(status) if status.is_active() => {
                let mut roots: Vec<RootPath> = Vec::new();
                for root in status.roots() {
                    if !roots.contains(root) {
                        roots.push(root.clone());
                    }
                }
                debug!(token = %token, roots = roots.len(), "Scope override active");
                roots
            },
            Ok(_) => {
                debug!(token = %token, "Scope override not active");
                Vec::new()
            },
            Err(e) => {
                warn!(token = %token, error = %e, "Scope override lookup failed, treating as inactive");
                Vec::new()
            },
        }
    }

    /// Evaluate `request` and decide whether it may proceed.
    ///
    /// Never fails: an unreadable configuration produces a blocking verdict.
    pub async fn enforce(&self, request: &ScopeRequest) -> ScopeGuardVerdict {
        let operation = request.operation.clone();

        let mut paths: Vec<RelPath> = Vec::with_capacity(request.paths.len());
        let mut rejected: Vec<RejectedPath> = Vec::new();
        for raw in &request.paths {
            match relativize(&self.repo_root, raw) {
                Ok(path) if path.is_empty() => {},
                Ok(path) => {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                },
                Err(e) => {
                    warn!(operation = %operation, path = %raw, error = %e, "Rejecting invalid path");
                    rejected.push(RejectedPath::from(&e));
                },
            }
        }

        if paths.is_empty() && rejected.is_empty() {
            debug!(operation = %operation, "No paths to check, skipping scope guard");
            return ScopeGuardVerdict::skipped(operation);
        }

        let context = match self.resolve_context(request).await {
            Ok(context) => context,
            Err(e) => {
                warn!(operation = %operation, error = %e, "Scope configuration unavailable, blocking");
                return ScopeGuardVerdict::unavailable(operation, &e.to_string());
            },
        };

        let verdict = ScopeGuardVerdict::evaluate(operation, context, &paths, rejected);
        log_verdict(&verdict, paths.len());
        verdict
    }
}

fn log_verdict(verdict: &ScopeGuardVerdict, checked: usize) {
    let domain = verdict
        .context
        .as_ref()
        .and_then(|c| c.domain.as_ref())
        .map_or("none", Domain::as_str);
    let policy = verdict
        .context
        .as_ref()
        .map_or(Policy::default(), |c| c.policy);

    if !verdict.ok {
        warn!(
            operation = %verdict.operation,
            domain,
            policy = %policy,
            out_of_scope = verdict.out_of_scope.len(),
            rejected = verdict.rejected.len(),
            "Scope guard blocked operation"
        );
    } else if verdict.is_advisory() {
        info!(
            operation = %verdict.operation,
            domain,
            out_of_scope = verdict.out_of_scope.len(),
            "Scope guard advisory: paths outside allowed roots"
        );
    } else {
        debug!(operation = %verdict.operation, domain, checked, "Scope guard allowed operation");
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("repo_root", &self.repo_root)
            .finish_non_exhaustive()
    }
}
