//! Persistent proposal records with atomic status transitions.
//!
//! Each proposal is one JSON record under its id in the `proposals`
//! namespace. A transition reads the record, checks that it is still
//! pending, and writes the new record with a compare-and-swap against the
//! exact bytes it read. Of two concurrent transitions only one swap can
//! succeed; the loser re-reads, sees the terminal state, and reports a
//! no-op.

use std::sync::Arc;

use scopeward_core::ProposalId;
use scopeward_storage::{KvStore, ScopedKvStore, decode_json, encode_json};
use tracing::{debug, info, warn};

use crate::error::{ProposalError, ProposalResult};
use crate::proposal::{Proposal, ProposalStatus, TransitionOutcome};

/// Namespace holding proposal records.
pub const PROPOSALS_NAMESPACE: &str = "proposals";

/// Upper bound on swap attempts for one transition.
///
/// Only pending records are ever swapped, so a lost race is normally
/// followed by a terminal read on the next attempt.
const MAX_SWAP_ATTEMPTS: u32 = 8;

/// Proposal persistence over a [`KvStore`].
#[derive(Debug, Clone)]
pub struct ProposalStore {
    records: ScopedKvStore,
}

impl ProposalStore {
    /// Create a store keeping records in [`PROPOSALS_NAMESPACE`] of `kv`.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in namespace; the signature follows
    /// [`ScopedKvStore::new`].
    pub fn new(kv: Arc<dyn KvStore>) -> ProposalResult<Self> {
        Ok(Self {
            records: ScopedKvStore::new(kv, PROPOSALS_NAMESPACE)?,
        })
    }

    /// Store a new proposal.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::AlreadyExists`] if the id is taken, or a
    /// storage error.
    pub async fn insert(&self, proposal: &Proposal) -> ProposalResult<()> {
        let bytes = encode_json(proposal)?;
        if !self
            .records
            .compare_and_swap(proposal.id.as_str(), None, bytes)
            .await?
        {
            return Err(ProposalError::AlreadyExists(proposal.id.clone()));
        }
        debug!(proposal_id = %proposal.id, status = %proposal.status, "Stored proposal");
        Ok(())
    }

    /// Read a proposal.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::StoreUnavailable`] when the backend fails and
    /// [`ProposalError::Corrupt`] when the record cannot be decoded.
    pub async fn find_by_id(&self, id: &ProposalId) -> ProposalResult<Option<Proposal>> {
        Ok(self.records.get_json(id.as_str()).await?)
    }

    /// All proposals, oldest first, optionally restricted to one status.
    ///
    /// Records that fail to decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    pub async fn list(&self, status: Option<ProposalStatus>) -> ProposalResult<Vec<Proposal>> {
        let mut proposals = Vec::new();
        for key in self.records.list_keys().await? {
            match self.records.get_json::<Proposal>(&key).await {
                Ok(Some(proposal)) => {
                    if status.is_none_or(|s| proposal.status == s) {
                        proposals.push(proposal);
                    }
                },
                Ok(None) => {},
                Err(e) => {
                    let err = ProposalError::from(e);
                    if err.is_retryable() {
                        return Err(err);
                    }
                    warn!(key = %key, error = %err, "Skipping unreadable proposal record");
                },
            }
        }
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(proposals)
    }

    /// Move a pending proposal to [`ProposalStatus::Applied`].
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::NotFound`] for unknown ids, or a storage
    /// error.
    pub async fn mark_applied(&self, id: &ProposalId) -> ProposalResult<TransitionOutcome> {
        self.transition(id, ProposalStatus::Applied, None).await
    }

    /// Move a pending proposal to [`ProposalStatus::Rejected`].
    ///
    /// # Errors
    ///
    /// Same as [`mark_applied`](Self::mark_applied).
    pub async fn mark_rejected(&self, id: &ProposalId) -> ProposalResult<TransitionOutcome> {
        self.transition(id, ProposalStatus::Rejected, None).await
    }

    /// Record that the executor failed to apply a pending proposal.
    ///
    /// # Errors
    ///
    /// Same as [`mark_applied`](Self::mark_applied).
    pub async fn mark_failed(
        &self,
        id: &ProposalId,
        reason: impl Into<String>,
    ) -> ProposalResult<TransitionOutcome> {
        self.transition(id, ProposalStatus::Failed, Some(reason.into()))
            .await
    }

    async fn transition(
        &self,
        id: &ProposalId,
        target: ProposalStatus,
        reason: Option<String>,
    ) -> ProposalResult<TransitionOutcome> {
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let Some(stored) = self.records.get(id.as_str()).await? else {
                return Err(ProposalError::NotFound(id.clone()));
            };
            let current: Proposal = decode_json(&stored)?;

            if current.status.is_terminal() {
                debug!(
                    proposal_id = %id,
                    status = %current.status,
                    requested = %target,
                    "Proposal already terminal"
                );
                return Ok(TransitionOutcome::already(current));
            }

            let next = current.transitioned(target, reason.clone());
            let swapped = self
                .records
                .compare_and_swap(id.as_str(), Some(stored.as_slice()), encode_json(&next)?)
                .await?;
            if swapped {
                info!(proposal_id = %id, status = %target, "Proposal transitioned");
                return Ok(TransitionOutcome::changed(next));
            }
            debug!(proposal_id = %id, attempt, "Lost transition race, re-reading");
        }

        warn!(proposal_id = %id, "Proposal transition did not settle");
        Err(ProposalError::StoreUnavailable(format!(
            "transition of proposal {id} did not settle after {MAX_SWAP_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use scopeward_storage::MemoryKvStore;

    use super::*;

    fn store() -> ProposalStore {
        ProposalStore::new(Arc::new(MemoryKvStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = store();
        let proposal = Proposal::pending("diff", vec![]);
        store.insert(&proposal).await.unwrap();
        assert_eq!(store.find_by_id(&proposal.id).await.unwrap(), Some(proposal.clone()));
        assert!(matches!(
            store.insert(&proposal).await,
            Err(ProposalError::AlreadyExists(_))
        ));
        assert!(
            store
                .find_by_id(&ProposalId::from_string("missing"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_mark_applied_is_idempotent() {
        let store = store();
        let proposal = Proposal::pending("diff", vec![]);
        store.insert(&proposal).await.unwrap();

        let first = store.mark_applied(&proposal.id).await.unwrap();
        assert!(first.ok && !first.noop);
        assert_eq!(first.proposal.status, ProposalStatus::Applied);

        let second = store.mark_applied(&proposal.id).await.unwrap();
        assert!(second.ok && second.noop);
        assert_eq!(second.proposal.status, ProposalStatus::Applied);
        assert_eq!(second.proposal.updated_at, first.proposal.updated_at);
    }

    #[tokio::test]
    async fn test_terminal_state_absorbs_other_transitions() {
        let store = store();
        let proposal = Proposal::pending("diff", vec![]);
        store.insert(&proposal).await.unwrap();
        store.mark_rejected(&proposal.id).await.unwrap();

        let outcome = store.mark_applied(&proposal.id).await.unwrap();
        assert!(outcome.noop);
        assert_eq!(outcome.proposal.status, ProposalStatus::Rejected);
        assert!(outcome.message.unwrap().contains("already rejected"));

        let outcome = store.mark_failed(&proposal.id, "exec error").await.unwrap();
        assert!(outcome.noop);
        assert!(outcome.proposal.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_records_reason() {
        let store = store();
        let proposal = Proposal::pending("diff", vec![]);
        store.insert(&proposal).await.unwrap();
        let outcome = store.mark_failed(&proposal.id, "patch did not apply").await.unwrap();
        assert_eq!(outcome.proposal.status, ProposalStatus::Failed);
        assert_eq!(outcome.proposal.failure_reason.as_deref(), Some("patch did not apply"));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let err = store()
            .mark_applied(&ProposalId::from_string("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProposalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        kv.set(PROPOSALS_NAMESPACE, "bad", b"{".to_vec()).await.unwrap();
        let store = ProposalStore::new(kv).unwrap();
        let err = store
            .find_by_id(&ProposalId::from_string("bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProposalError::Corrupt(_)));
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = store();
        let a = Proposal::pending("a", vec![]);
        let b = Proposal::pending("b", vec![]);
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();
        store.mark_applied(&b.id).await.unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 2);
        let pending = store.list(Some(ProposalStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_settle_once() {
        let store = store();
        let proposal = Proposal::pending("diff", vec![]);
        store.insert(&proposal).await.unwrap();

        let mut handles = Vec::new();
        for i in 0u32..12 {
            let store = store.clone();
            let id = proposal.id.clone();
            handles.push(tokio::spawn(async move {
                if i.is_multiple_of(2) {
                    store.mark_applied(&id).await.unwrap()
                } else {
                    store.mark_rejected(&id).await.unwrap()
                }
            }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }
        let changed: Vec<&TransitionOutcome> = outcomes.iter().filter(|o| !o.noop).collect();
        assert_eq!(changed.len(), 1);
        let winner = changed[0].proposal.status;
        assert!(outcomes.iter().all(|o| o.proposal.status == winner));
    }
}
