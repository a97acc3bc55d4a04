//! Proposal state transitions: idempotence, races, and storage outages.

use std::sync::Arc;

use scopeward_core::{Policy, ProposalId};
use scopeward_proposals::{ProposalError, ProposalStatus, TransitionOutcome};
use scopeward_test::{FailingKvStore, TestHarness, story_config, test_proposal};

#[tokio::test]
async fn test_mark_applied_twice_is_idempotent() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let proposal = harness.insert_story_proposal("content/story/p1.md").await;

    let first = harness.store.mark_applied(&proposal.id).await.unwrap();
    assert!(first.ok);
    assert!(!first.noop);

    let second = harness.store.mark_applied(&proposal.id).await.unwrap();
    assert!(second.ok);
    assert!(second.noop);
    assert_eq!(second.proposal.status, ProposalStatus::Applied);
    assert_eq!(second.proposal.resolved_at, first.proposal.resolved_at);
}

#[tokio::test]
async fn test_apply_then_reject_is_noop() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let proposal = harness.insert_story_proposal("content/story/p1.md").await;

    harness.service.apply(&proposal.id).await.unwrap();
    let outcome = harness.service.reject(&proposal.id).await.unwrap();
    assert!(outcome.noop);
    assert_eq!(outcome.proposal.status, ProposalStatus::Applied);
    assert_eq!(
        outcome.message.as_deref(),
        Some(format!("proposal {} is already applied", proposal.id).as_str())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_apply_settles_exactly_once() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let proposal = harness.insert_story_proposal("content/story/p1.md").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = harness.service.clone();
        let id = proposal.id.clone();
        handles.push(tokio::spawn(async move { service.apply(&id).await }));
    }

    let mut outcomes: Vec<TransitionOutcome> = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(outcomes.iter().filter(|o| !o.noop).count(), 1);
    assert!(outcomes.iter().all(|o| o.ok));
    assert!(
        outcomes
            .iter()
            .all(|o| o.proposal.status == ProposalStatus::Applied)
    );
}

#[tokio::test]
async fn test_unknown_proposal_is_not_found() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let err = harness
        .service
        .apply(&ProposalId::from_string("does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProposalError::NotFound(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_store_outage_is_retryable() {
    let kv = Arc::new(FailingKvStore::healthy());
    let harness = TestHarness::with_kv(story_config(&["content/story"], Policy::Hard), kv.clone());
    let proposal = harness.insert_story_proposal("content/story/p1.md").await;

    kv.set_failing(true);
    let err = harness.service.apply(&proposal.id).await.unwrap_err();
    assert!(matches!(err, ProposalError::StoreUnavailable(_)));
    assert!(err.is_retryable());

    kv.set_failing(false);
    let stored = harness.store.find_by_id(&proposal.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProposalStatus::Pending);

    let outcome = harness.service.apply(&proposal.id).await.unwrap();
    assert_eq!(outcome.proposal.status, ProposalStatus::Applied);
}

#[tokio::test]
async fn test_executor_failure_is_terminal() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let proposal = harness.insert_story_proposal("content/story/p1.md").await;

    let failed = harness
        .store
        .mark_failed(&proposal.id, "patch did not apply cleanly")
        .await
        .unwrap();
    assert_eq!(failed.proposal.status, ProposalStatus::Failed);

    let outcome = harness.service.apply(&proposal.id).await.unwrap();
    assert!(outcome.noop);
    assert_eq!(outcome.proposal.status, ProposalStatus::Failed);
}

#[tokio::test]
async fn test_list_pending_proposals() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let a = harness.insert(test_proposal(&["content/story/a.md"])).await;
    let b = harness.insert(test_proposal(&["content/story/b.md"])).await;
    harness.service.reject(&a.id).await.unwrap();

    let pending = harness.store.list(Some(ProposalStatus::Pending)).await.unwrap();
    assert_eq!(pending.iter().map(|p| &p.id).collect::<Vec<_>>(), vec![&b.id]);
    assert_eq!(harness.store.list(None).await.unwrap().len(), 2);
}
