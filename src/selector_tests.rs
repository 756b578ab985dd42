use super::*;
use crate::bucket::BucketConfig;

fn full_bucket(indices: &[usize]) -> TokenBucket {
    let bucket = TokenBucket::new(BucketConfig::default());
    for &i in indices {
        bucket.consume(i, 0.0);
        let _ = i;
    }
    bucket
}

#[test]
fn selection_stickiness_keeps_active_account() {
    let bucket = full_bucket(&[0, 1]);
    let metrics = vec![
        AccountMetrics { index: 0, last_used: 3_600_000, health_score: 70.0, is_rate_limited: false, enabled: true },
        AccountMetrics { index: 1, last_used: 0, health_score: 70.0, is_rate_limited: false, enabled: true },
    ];
    let selector = Selector::new(SelectionStrategy::Hybrid);
    let picked = selector.select(&metrics, &bucket, Some(0), 3_600_000);
    assert_eq!(picked, Some(0));
}

#[test]
fn forced_switch_when_advantage_exceeds_threshold() {
    let bucket = full_bucket(&[0, 1]);
    // base(A1) - base(A0) = 2*(100-50) = 100, exactly the threshold: no switch.
    let metrics_at_threshold = vec![
        AccountMetrics { index: 0, last_used: 0, health_score: 50.0, is_rate_limited: false, enabled: true },
        AccountMetrics { index: 1, last_used: 0, health_score: 100.0, is_rate_limited: false, enabled: true },
    ];
    let selector = Selector::new(SelectionStrategy::Hybrid);
    assert_eq!(selector.select(&metrics_at_threshold, &bucket, Some(0), 0), Some(0));

    // Bump health just above: advantage 102 > 100, switches.
    let metrics_over_threshold = vec![
        AccountMetrics { index: 0, last_used: 0, health_score: 50.0, is_rate_limited: false, enabled: true },
        AccountMetrics { index: 1, last_used: 0, health_score: 100.5, is_rate_limited: false, enabled: true },
    ];
    assert_eq!(selector.select(&metrics_over_threshold, &bucket, Some(0), 0), Some(1));
}

#[test]
fn hybrid_never_returns_rate_limited_disabled_or_empty_account() {
    let bucket = TokenBucket::new(BucketConfig::default());
    bucket.consume(2, 50.0); // drain account 2 to zero tokens
    let metrics = vec![
        AccountMetrics { index: 0, last_used: 0, health_score: 70.0, is_rate_limited: true, enabled: true },
        AccountMetrics { index: 1, last_used: 0, health_score: 70.0, is_rate_limited: false, enabled: false },
        AccountMetrics { index: 2, last_used: 0, health_score: 70.0, is_rate_limited: false, enabled: true },
    ];
    let selector = Selector::new(SelectionStrategy::Hybrid);
    assert_eq!(selector.select(&metrics, &bucket, None, 0), None);
}

#[test]
fn hybrid_falls_back_to_none_when_all_candidates_filtered() {
    let bucket = TokenBucket::new(BucketConfig::default());
    let metrics = vec![AccountMetrics { index: 0, last_used: 0, health_score: 10.0, is_rate_limited: false, enabled: true }];
    let selector = Selector::new(SelectionStrategy::Hybrid);
    // Single-account mode forces sticky, which ignores health, so this should return the account.
    assert_eq!(selector.select(&metrics, &bucket, None, 0), Some(0));
}

#[test]
fn single_account_mode_forces_sticky_even_when_configured_hybrid() {
    let bucket = TokenBucket::new(BucketConfig::default());
    let metrics = vec![AccountMetrics { index: 0, last_used: 0, health_score: 0.0, is_rate_limited: false, enabled: true }];
    let selector = Selector::new(SelectionStrategy::Hybrid);
    assert_eq!(selector.select(&metrics, &bucket, Some(0), 0), Some(0));
}

#[test]
fn sticky_returns_first_enabled_when_active_filtered_out() {
    let bucket = TokenBucket::new(BucketConfig::default());
    let metrics = vec![
        AccountMetrics { index: 0, last_used: 0, health_score: 70.0, is_rate_limited: true, enabled: true },
        AccountMetrics { index: 1, last_used: 0, health_score: 70.0, is_rate_limited: false, enabled: true },
    ];
    let selector = Selector::new(SelectionStrategy::Sticky);
    assert_eq!(selector.select(&metrics, &bucket, Some(0), 0), Some(1));
}

#[test]
fn round_robin_wraps_to_first_after_last() {
    let bucket = TokenBucket::new(BucketConfig::default());
    let metrics = vec![
        AccountMetrics { index: 0, last_used: 0, health_score: 70.0, is_rate_limited: false, enabled: true },
        AccountMetrics { index: 1, last_used: 0, health_score: 70.0, is_rate_limited: false, enabled: true },
    ];
    let selector = Selector::new(SelectionStrategy::RoundRobin);
    assert_eq!(selector.select(&metrics, &bucket, Some(1), 0), Some(0));
}
