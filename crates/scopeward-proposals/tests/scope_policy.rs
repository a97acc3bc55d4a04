//! Scope policy enforcement at proposal-apply time.

use scopeward_config::Config;
use scopeward_core::{Domain, LoopId, Policy, RelPath, RootPath};
use scopeward_proposals::{Proposal, ProposalError, ProposalStatus};
use scopeward_test::{TestHarness, loop_config, story_config, test_proposal, test_token};
use scopeward_workspace::{Operation, ScopeRequest};

/// The story domain under a hard policy admits its own pages and blocks
/// everything else.
#[tokio::test]
async fn test_story_hard_policy_end_to_end() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));

    let allowed = ScopeRequest::from_raw(
        "story-page-save",
        &["content/story/page1.md"],
        Some("story"),
        None,
        None,
    );
    let verdict = harness.guard.enforce(&allowed).await;
    assert!(verdict.ok);
    assert!(verdict.out_of_scope.is_empty());

    let blocked = ScopeRequest::from_raw(
        "story-page-save",
        &["src/index.ts"],
        Some("story"),
        None,
        None,
    );
    let verdict = harness.guard.enforce(&blocked).await;
    assert!(!verdict.ok);
    assert_eq!(verdict.out_of_scope, vec![RelPath::parse("src/index.ts").unwrap()]);
    assert!(verdict.message.unwrap().contains("story-page-save blocked"));
}

#[tokio::test]
async fn test_apply_in_scope_proposal() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let proposal = harness.insert_story_proposal("content/story/page1.md").await;

    let outcome = harness.service.apply(&proposal.id).await.unwrap();
    assert!(outcome.ok && !outcome.noop);
    assert_eq!(outcome.proposal.status, ProposalStatus::Applied);
}

#[tokio::test]
async fn test_policy_tightened_after_creation_blocks_apply() {
    let harness = TestHarness::new(story_config(&["content"], Policy::Hard));
    let proposal = harness.insert_story_proposal("content/notes/draft.md").await;

    harness.set_config(story_config(&["content/story"], Policy::Hard));

    let err = harness.service.apply(&proposal.id).await.unwrap_err();
    let ProposalError::PolicyBlocked(verdict) = err else {
        panic!("expected PolicyBlocked, got {err:?}");
    };
    assert_eq!(verdict.operation, Operation::ProposalApply);
    assert_eq!(
        verdict.out_of_scope,
        vec![RelPath::parse("content/notes/draft.md").unwrap()]
    );

    let stored = harness.store.find_by_id(&proposal.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProposalStatus::Pending);
}

#[tokio::test]
async fn test_soft_policy_applies_with_advisory() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Soft));
    let proposal = harness.insert_story_proposal("src/index.ts").await;

    let outcome = harness.service.apply(&proposal.id).await.unwrap();
    assert_eq!(outcome.proposal.status, ProposalStatus::Applied);
}

#[tokio::test]
async fn test_override_token_widens_scope_until_revoked() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    harness.overrides.grant("ovr-1", &["assets"]);

    let gated = test_proposal(&["assets/cover.png"])
        .with_scope_override_token(Some(test_token("ovr-1")));
    let first = harness.insert(gated.clone()).await;
    let outcome = harness.service.apply(&first.id).await.unwrap();
    assert_eq!(outcome.proposal.status, ProposalStatus::Applied);

    harness.overrides.revoke("ovr-1");
    let second = harness
        .insert(
            test_proposal(&["assets/banner.png"])
                .with_scope_override_token(Some(test_token("ovr-1"))),
        )
        .await;
    let err = harness.service.apply(&second.id).await.unwrap_err();
    let ProposalError::PolicyBlocked(verdict) = err else {
        panic!("expected PolicyBlocked, got {err:?}");
    };
    let context = verdict.context.as_ref().unwrap();
    assert!(context.override_presented);
    assert!(!context.override_active);

    let lookups = harness.overrides.lookups();
    assert_eq!(lookups.len(), 2);
    assert!(lookups.iter().all(|(token, _)| token == "ovr-1"));
}

#[tokio::test]
async fn test_override_lookup_failure_is_inactive() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    harness.overrides.grant("ovr-2", &["assets"]);
    harness.overrides.set_failing(true);

    let proposal = harness
        .insert(
            test_proposal(&["assets/cover.png"])
                .with_scope_override_token(Some(test_token("ovr-2"))),
        )
        .await;
    assert!(matches!(
        harness.service.apply(&proposal.id).await,
        Err(ProposalError::PolicyBlocked(_))
    ));
}

#[tokio::test]
async fn test_loop_roots_apply_without_domain_roots() {
    let mut config = Config::default();
    config.domains.story = None;
    let harness = TestHarness::new(config);
    harness.write_loop("refactor-parser", &["crates/parser"]);

    let request = ScopeRequest::from_raw(
        "file-write",
        &["crates/parser/src/lib.rs", "README.md"],
        None,
        Some("refactor-parser"),
        None,
    );
    let context = harness.guard.resolve_context(&request).await.unwrap();
    assert_eq!(context.loop_id, LoopId::parse("refactor-parser"));
    assert_eq!(context.allowed_roots, vec![RootPath::parse("crates/parser").unwrap()]);

    // No domain means soft policy: out-of-scope paths are reported only.
    let verdict = harness.guard.enforce(&request).await;
    assert!(verdict.ok);
    assert_eq!(verdict.out_of_scope, vec![RelPath::parse("README.md").unwrap()]);
}

#[tokio::test]
async fn test_escaping_diff_path_blocks_apply() {
    let harness = TestHarness::new(story_config(&["."], Policy::Soft));
    let diff = "--- a/../outside.txt\n+++ b/../outside.txt\n@@ -1 +1 @@\n-a\n+b\n";
    let proposal = harness
        .insert(Proposal::pending(diff, vec![]))
        .await;

    let err = harness.service.apply(&proposal.id).await.unwrap_err();
    let ProposalError::PolicyBlocked(verdict) = err else {
        panic!("expected PolicyBlocked, got {err:?}");
    };
    assert_eq!(verdict.rejected.len(), 1);
    assert_eq!(verdict.rejected[0].path, "../outside.txt");
}

#[tokio::test]
async fn test_rename_out_of_protected_path_blocks_apply() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let diff = "\
diff --git a/src/secret.rs b/content/story/moved.md
similarity index 90%
rename from src/secret.rs
rename to content/story/moved.md
--- a/src/secret.rs
+++ b/content/story/moved.md
@@ -1 +1 @@
-let key = 1;
+let key = 2;
";
    let proposal = harness
        .insert(
            Proposal::pending(diff, vec![RelPath::parse("content/story/moved.md").unwrap()])
                .with_domain(Domain::parse("story")),
        )
        .await;

    let err = harness.service.apply(&proposal.id).await.unwrap_err();
    let ProposalError::PolicyBlocked(verdict) = err else {
        panic!("expected PolicyBlocked, got {err:?}");
    };
    assert_eq!(verdict.out_of_scope, vec![RelPath::parse("src/secret.rs").unwrap()]);

    let stored = harness.store.find_by_id(&proposal.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProposalStatus::Pending);
}

/// A path that resolves to the repository itself is checked like any other
/// path rather than dropped.
#[tokio::test]
async fn test_repo_root_path_is_not_skipped() {
    let harness = TestHarness::new(story_config(&["content/story"], Policy::Hard));
    let absolute_root = harness.repo_root().to_string_lossy().into_owned();

    for raw in ["src/..", "./.", absolute_root.as_str()] {
        let request = ScopeRequest::from_raw("story-page-save", &[raw], Some("story"), None, None);
        let verdict = harness.guard.enforce(&request).await;
        assert!(!verdict.ok, "{raw} should be blocked");
        assert!(!verdict.skipped, "{raw} should be checked");
        assert_eq!(verdict.out_of_scope, vec![RelPath::parse(".").unwrap()]);
    }

    harness.set_config(story_config(&["."], Policy::Hard));
    let request = ScopeRequest::from_raw("story-page-save", &["src/.."], Some("story"), None, None);
    assert!(harness.guard.enforce(&request).await.ok);
}

#[tokio::test]
async fn test_loops_directory_is_read_per_request() {
    let harness = TestHarness::new(loop_config(".scopeward/loops"));
    harness.write_loop("l1", &["crates/parser"]);

    let request = ScopeRequest::from_raw("file-write", &["crates/parser/a.rs"], None, Some("l1"), None);
    let context = harness.guard.resolve_context(&request).await.unwrap();
    assert_eq!(context.allowed_roots, vec![RootPath::parse("crates/parser").unwrap()]);

    harness.set_config(loop_config("work/loops"));
    harness.write_loop("l1", &["crates/lexer"]);
    let context = harness.guard.resolve_context(&request).await.unwrap();
    assert_eq!(context.allowed_roots, vec![RootPath::parse("crates/lexer").unwrap()]);
}
