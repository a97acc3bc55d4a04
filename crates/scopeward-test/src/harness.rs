//! Wired-up proposal lifecycle for integration tests.

use std::path::Path;
use std::sync::Arc;

use scopeward_config::{Config, FileLoopRoots, StaticConfigProvider};
use scopeward_core::Token;
use scopeward_proposals::{Proposal, ProposalService, ProposalStore};
use scopeward_storage::{KvStore, MemoryKvStore};
use scopeward_telemetry::{LogConfig, LogTarget, setup_logging};
use scopeward_workspace::ScopeGuard;
use tempfile::TempDir;

use crate::fixtures::test_proposal;
use crate::mocks::{MockApprovalResolver, MockOverrideStatus};

/// Send log output configured by `config.logging` to the libtest capture.
///
/// Only the first call in a test binary installs a subscriber; later calls
/// and invalid logging sections are ignored.
pub fn setup_test_logging(config: &Config) {
    let Ok(log) = LogConfig::try_from(&config.logging) else {
        return;
    };
    let _ = setup_logging(&log.with_target(LogTarget::Test));
}

/// A guard, store and service over a temporary repository.
///
/// The configuration is held in a [`StaticConfigProvider`] so tests can
/// tighten policy between requests, and work-loop files are written into the
/// temporary repository.
pub struct TestHarness {
    /// Temporary repository root.
    pub repo: TempDir,
    /// Swappable configuration.
    pub config: Arc<StaticConfigProvider>,
    /// Override grants seen by the guard.
    pub overrides: MockOverrideStatus,
    /// Resolver used by the service.
    pub approvals: MockApprovalResolver,
    /// The guard.
    pub guard: ScopeGuard,
    /// The proposal store.
    pub store: ProposalStore,
    /// The service under test.
    pub service: ProposalService,
}

impl TestHarness {
    /// A harness over an in-memory store with a refusing resolver.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::build(config, Arc::new(MemoryKvStore::new()), MockApprovalResolver::new())
    }

    /// A harness over `kv`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn with_kv(config: Config, kv: Arc<dyn KvStore>) -> Self {
        Self::build(config, kv, MockApprovalResolver::new())
    }

    /// A harness whose service routes approvals through `approvals`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn with_approvals(config: Config, approvals: MockApprovalResolver) -> Self {
        Self::build(config, Arc::new(MemoryKvStore::new()), approvals)
    }

    fn build(config: Config, kv: Arc<dyn KvStore>, approvals: MockApprovalResolver) -> Self {
        setup_test_logging(&config);
        let repo = tempfile::tempdir().expect("temp repo");
        let loops = FileLoopRoots::configured();
        let provider = Arc::new(StaticConfigProvider::new(config.clone()));
        let overrides = MockOverrideStatus::new();
        let guard = ScopeGuard::new(
            repo.path(),
            provider.clone(),
            Arc::new(loops),
            Arc::new(overrides.clone()),
        );
        let store = ProposalStore::new(kv).expect("proposal store");
        let service = ProposalService::new(store.clone(), guard.clone())
            .with_approval_resolver(Arc::new(approvals.clone()))
            .with_config(&config);
        Self {
            repo,
            config: provider,
            overrides,
            approvals,
            guard,
            store,
            service,
        }
    }

    /// The temporary repository root.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        self.repo.path()
    }

    /// Write a work-loop file granting `roots` under the configured loops
    /// directory.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_loop(&self, loop_id: &str, roots: &[&str]) {
        let config = self.current_config();
        let dir = self.repo.path().join(&config.loops.directory);
        std::fs::create_dir_all(&dir).expect("loops dir");
        let quoted: Vec<String> = roots.iter().map(|r| format!("{r:?}")).collect();
        std::fs::write(
            dir.join(format!("{loop_id}.toml")),
            format!("roots = [{}]\n", quoted.join(", ")),
        )
        .expect("loop file");
    }

    /// Replace the configuration seen by later requests.
    pub fn set_config(&self, config: Config) {
        self.config.replace(config);
    }

    fn current_config(&self) -> Config {
        use scopeward_config::ConfigProvider;
        self.config.read_repo_config().unwrap_or_default()
    }

    /// Store `proposal`.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects it.
    pub async fn insert(&self, proposal: Proposal) -> Proposal {
        self.store.insert(&proposal).await.expect("insert proposal");
        proposal
    }

    /// Store a story proposal touching `path`.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects it.
    pub async fn insert_story_proposal(&self, path: &str) -> Proposal {
        self.insert(test_proposal(&[path])).await
    }

    /// Store a story proposal touching `path` gated by `token`, and bind the
    /// token to it in the mock resolver.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects it.
    pub async fn insert_gated_proposal(&self, path: &str, token: &Token) -> Proposal {
        let proposal = test_proposal(&[path]).with_approval_token(Some(token.clone()));
        self.approvals.bind(token.expose(), &proposal.id);
        self.insert(proposal).await
    }
}
