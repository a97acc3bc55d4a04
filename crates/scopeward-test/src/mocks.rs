//! Mock implementations for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scopeward_core::{Domain, ProposalId, RootPath, Token};
use scopeward_proposals::{
    ApprovalResolution, ApprovalResolver, ApprovalResolverError, ApprovalVerb, ProposalStore,
};
use scopeward_storage::{KvStore, MemoryKvStore, StorageError, StorageResult};
use scopeward_workspace::{
    OverrideGrant, OverrideLookupError, OverrideStatus, OverrideStatusProvider,
};

// ---------------------------------------------------------------------------
// Override status
// ---------------------------------------------------------------------------

/// Override status provider backed by an in-memory grant table.
///
/// Grants can be added or revoked while a guard holds the provider, which
/// is how tests exercise "override expired between two requests".
#[derive(Debug, Clone, Default)]
pub struct MockOverrideStatus {
    grants: Arc<Mutex<HashMap<String, Vec<RootPath>>>>,
    failing: Arc<AtomicBool>,
    lookups: Arc<Mutex<Vec<(String, Option<Domain>)>>>,
}

impl MockOverrideStatus {
    /// A provider with no active grants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `token` active with the given extra roots.
    ///
    /// # Panics
    ///
    /// Panics if a root is not a valid repository-relative directory.
    #[must_use]
    pub fn with_grant(self, token: &str, roots: &[&str]) -> Self {
        self.grant(token, roots);
        self
    }

    /// Make `token` active with the given extra roots.
    ///
    /// # Panics
    ///
    /// Panics if a root is not a valid repository-relative directory.
    pub fn grant(&self, token: &str, roots: &[&str]) {
        let roots = roots
            .iter()
            .map(|r| RootPath::parse(r).expect("valid override root"))
            .collect();
        if let Ok(mut guard) = self.grants.lock() {
            guard.insert(token.to_owned(), roots);
        }
    }

    /// Expire `token`.
    pub fn revoke(&self, token: &str) {
        if let Ok(mut guard) = self.grants.lock() {
            guard.remove(token);
        }
    }

    /// Make every lookup fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `(token, domain)` pair looked up so far.
    #[must_use]
    pub fn lookups(&self) -> Vec<(String, Option<Domain>)> {
        self.lookups
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OverrideStatusProvider for MockOverrideStatus {
    async fn scope_override_status(
        &self,
        token: &Token,
        domain: Option<&Domain>,
    ) -> Result<OverrideStatus, OverrideLookupError> {
        if let Ok(mut guard) = self.lookups.lock() {
            guard.push((token.expose().to_owned(), domain.cloned()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(OverrideLookupError("override service offline".to_owned()));
        }
        let roots = self
            .grants
            .lock()
            .ok()
            .and_then(|g| g.get(token.expose()).cloned());
        Ok(match roots {
            Some(roots) => OverrideStatus {
                active: vec![OverrideGrant { roots }],
            },
            None => OverrideStatus::inactive(),
        })
    }
}

// ---------------------------------------------------------------------------
// Approval resolver
// ---------------------------------------------------------------------------

/// One scripted resolver answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedApproval {
    /// Confirm the decision.
    Grant,
    /// Refuse with a message.
    Refuse(String),
    /// Fail the call itself.
    Fail(String),
    /// Never answer.
    Hang,
}

/// Approval resolver answering from a queue of scripted results.
///
/// When the queue is empty the default answer is used (`Refuse` unless
/// changed). With [`with_authority`](Self::with_authority) the resolver also
/// records granted decisions in a proposal store, the way a real approval
/// service owns the transition.
#[derive(Clone)]
pub struct MockApprovalResolver {
    script: Arc<Mutex<VecDeque<ScriptedApproval>>>,
    default: ScriptedApproval,
    delay: Duration,
    calls: Arc<Mutex<Vec<(String, ApprovalVerb)>>>,
    authority: Arc<Mutex<Option<ProposalStore>>>,
    bindings: Arc<Mutex<HashMap<String, ProposalId>>>,
}

impl std::fmt::Debug for MockApprovalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockApprovalResolver")
            .field("default", &self.default)
            .field("delay", &self.delay)
            .field("authoritative", &self.authority().is_some())
            .finish_non_exhaustive()
    }
}

impl Default for MockApprovalResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApprovalResolver {
    /// A resolver that refuses everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default: ScriptedApproval::Refuse("refused by mock".to_owned()),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            authority: Arc::new(Mutex::new(None)),
            bindings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A resolver that grants everything.
    #[must_use]
    pub fn granting() -> Self {
        Self::new().with_default(ScriptedApproval::Grant)
    }

    /// Set the answer used once the script runs out.
    #[must_use]
    pub fn with_default(mut self, answer: ScriptedApproval) -> Self {
        self.default = answer;
        self
    }

    /// Queue an answer.
    #[must_use]
    pub fn with_answer(self, answer: ScriptedApproval) -> Self {
        self.queue(answer);
        self
    }

    /// Sleep before every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record granted decisions in `store` for tokens bound with
    /// [`bind`](Self::bind).
    #[must_use]
    pub fn with_authority(self, store: ProposalStore) -> Self {
        self.set_authority(store);
        self
    }

    /// Record granted decisions in `store`; shared with every clone.
    pub fn set_authority(&self, store: ProposalStore) {
        if let Ok(mut guard) = self.authority.lock() {
            *guard = Some(store);
        }
    }

    fn authority(&self) -> Option<ProposalStore> {
        self.authority.lock().ok().and_then(|g| (*g).clone())
    }

    /// Associate an approval token with the proposal it gates.
    pub fn bind(&self, token: &str, id: &ProposalId) {
        if let Ok(mut guard) = self.bindings.lock() {
            guard.insert(token.to_owned(), id.clone());
        }
    }

    /// Queue an answer.
    pub fn queue(&self, answer: ScriptedApproval) {
        if let Ok(mut guard) = self.script.lock() {
            guard.push_back(answer);
        }
    }

    /// Every `(token, verb)` the resolver was asked about.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, ApprovalVerb)> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn next_answer(&self) -> ScriptedApproval {
        self.script
            .lock()
            .ok()
            .and_then(|mut g| g.pop_front())
            .unwrap_or_else(|| self.default.clone())
    }

    async fn record_decision(
        &self,
        token: &Token,
        verb: ApprovalVerb,
    ) -> Result<(), ApprovalResolverError> {
        let Some(store) = self.authority() else {
            return Ok(());
        };
        let bound = self
            .bindings
            .lock()
            .ok()
            .and_then(|g| g.get(token.expose()).cloned());
        let Some(id) = bound else {
            return Ok(());
        };
        let result = match verb {
            ApprovalVerb::Approve => store.mark_applied(&id).await,
            ApprovalVerb::Reject => store.mark_rejected(&id).await,
        };
        result
            .map(|_| ())
            .map_err(|e| ApprovalResolverError(e.to_string()))
    }
}

#[async_trait]
impl ApprovalResolver for MockApprovalResolver {
    async fn resolve_approval(
        &self,
        token: &Token,
        verb: ApprovalVerb,
    ) -> Result<ApprovalResolution, ApprovalResolverError> {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push((token.expose().to_owned(), verb));
        }
        let answer = self.next_answer();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match answer {
            ScriptedApproval::Grant => {
                self.record_decision(token, verb).await?;
                Ok(ApprovalResolution::granted())
            },
            ScriptedApproval::Refuse(message) => Ok(ApprovalResolution::refused(message)),
            ScriptedApproval::Fail(message) => Err(ApprovalResolverError(message)),
            ScriptedApproval::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Key-value store that can be switched into a simulated outage.
///
/// While failing, every call returns [`StorageError::Connection`]. While
/// healthy, calls go to an in-memory store.
#[derive(Debug)]
pub struct FailingKvStore {
    inner: MemoryKvStore,
    failing: AtomicBool,
}

impl Default for FailingKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FailingKvStore {
    /// A store that fails from the start.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryKvStore::new(),
            failing: AtomicBool::new(true),
        }
    }

    /// A store that works until [`set_failing`](Self::set_failing) is called.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            inner: MemoryKvStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    /// Start or end the outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("simulated outage".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check()?;
        self.inner.set(namespace, key, value).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(namespace, key).await
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.check()?;
        self.inner.list_keys(namespace).await
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        self.check()?;
        self.inner
            .compare_and_swap(namespace, key, expected, value)
            .await
    }
}
