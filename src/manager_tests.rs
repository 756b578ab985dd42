use tempfile::tempdir;

use super::*;
use crate::selector::SelectionStrategy;

fn manager(dir: &tempfile::TempDir) -> AccountManager {
    let store = AccountStore::new(dir.path().join("accounts.json"));
    let http = reqwest::Client::new();
    let token_service = TokenService::new(http, "https://example.invalid/token".into(), "client-id".into());
    AccountManager::new(
        store,
        token_service,
        HealthConfig::default(),
        BucketConfig::default(),
        SelectionStrategy::Hybrid,
    )
}

#[tokio::test]
async fn add_account_appends_and_activates_first() {
    let dir = tempdir().unwrap();
    let mgr = manager(&dir);
    let idx = mgr.add_account("at-1".into(), "rt-1".into(), Some(now_ms() + 3_600_000)).await;
    assert_eq!(idx, 0);

    let state = mgr.state.read().await;
    assert_eq!(state.active_index, 0);
    assert_eq!(state.accounts[0].refresh_token, "rt-1");
}

#[tokio::test]
async fn add_account_overwrites_matching_refresh_token() {
    let dir = tempdir().unwrap();
    let mgr = manager(&dir);
    mgr.add_account("at-1".into(), "rt-1".into(), None).await;
    mgr.record_failure(0).await;
    mgr.record_failure(0).await;

    let idx = mgr.add_account("at-2".into(), "rt-1".into(), Some(now_ms() + 1000)).await;
    assert_eq!(idx, 0);

    let state = mgr.state.read().await;
    assert_eq!(state.accounts[0].access_token.as_deref(), Some("at-2"));
    assert_eq!(state.accounts[0].consecutive_failures, 0);
}

#[tokio::test]
async fn record_failure_disables_after_five_consecutive() {
    let dir = tempdir().unwrap();
    let mgr = manager(&dir);
    mgr.add_account("at-1".into(), "rt-1".into(), None).await;
    for _ in 0..5 {
        mgr.record_failure(0).await;
    }
    let state = mgr.state.read().await;
    assert!(!state.accounts[0].enabled);
    assert_eq!(state.accounts[0].consecutive_failures, 5);
}

#[tokio::test]
async fn quota_escalation_produces_expected_backoff_offsets() {
    let dir = tempdir().unwrap();
    let mgr = manager(&dir);
    mgr.add_account("at-1".into(), "rt-1".into(), None).await;

    let before = now_ms();
    mgr.mark_rate_limited(0, RateLimitReason::UsageLimitReached).await;
    let reset_1 = mgr.state.read().await.accounts[0].rate_limit_reset_time.unwrap();
    assert!(reset_1 >= before + 60_000 && reset_1 < before + 61_000);

    mgr.mark_rate_limited(0, RateLimitReason::UsageLimitReached).await;
    let reset_2 = mgr.state.read().await.accounts[0].rate_limit_reset_time.unwrap();
    assert!(reset_2 >= before + 300_000 && reset_2 < before + 301_000);

    mgr.mark_rate_limited(0, RateLimitReason::UsageLimitReached).await;
    let reset_3 = mgr.state.read().await.accounts[0].rate_limit_reset_time.unwrap();
    assert!(reset_3 >= before + 1_800_000 && reset_3 < before + 1_800_100);
}

#[tokio::test]
async fn is_rate_limited_clears_expired_reset_as_side_effect() {
    let dir = tempdir().unwrap();
    let mgr = manager(&dir);
    mgr.add_account("at-1".into(), "rt-1".into(), None).await;
    {
        let mut state = mgr.state.write().await;
        state.accounts[0].rate_limit_reset_time = Some(now_ms().saturating_sub(1000));
        state.accounts[0].rate_limit_reason = Some(RateLimitReason::RateLimitExceeded);
    }

    assert!(!mgr.is_rate_limited(0).await);
    let state = mgr.state.read().await;
    assert!(state.accounts[0].rate_limit_reset_time.is_none());
    assert!(state.accounts[0].rate_limit_reason.is_none());
}

#[tokio::test]
async fn select_account_returns_none_when_pool_empty() {
    let dir = tempdir().unwrap();
    let mgr = manager(&dir);
    assert!(mgr.select_account().await.is_none());
}

#[tokio::test]
async fn record_success_resets_failures_and_updates_last_used() {
    let dir = tempdir().unwrap();
    let mgr = manager(&dir);
    mgr.add_account("at-1".into(), "rt-1".into(), None).await;
    mgr.record_failure(0).await;
    mgr.record_success(0).await;

    let state = mgr.state.read().await;
    assert_eq!(state.accounts[0].consecutive_failures, 0);
}
