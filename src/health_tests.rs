use proptest::prelude::*;

use super::*;

#[test]
fn unknown_account_starts_at_initial() {
    let tracker = HealthTracker::new(HealthConfig::default());
    assert_eq!(tracker.get_score(0), 70.0);
}

#[test]
fn record_success_increments_by_reward() {
    let tracker = HealthTracker::new(HealthConfig::default());
    tracker.record_success(0);
    assert_eq!(tracker.get_score(0), 71.0);
}

#[test]
fn record_failure_clamps_at_zero() {
    let tracker = HealthTracker::new(HealthConfig::default());
    for _ in 0..10 {
        tracker.record_failure(0);
    }
    assert_eq!(tracker.get_score(0), 0.0);
}

#[test]
fn record_success_clamps_at_max_score() {
    let tracker = HealthTracker::new(HealthConfig::default());
    for _ in 0..100 {
        tracker.record_success(0);
    }
    assert_eq!(tracker.get_score(0), 100.0);
}

#[test]
fn is_usable_reflects_min_usable_threshold() {
    let tracker = HealthTracker::new(HealthConfig::default());
    assert!(tracker.is_usable(0));
    for _ in 0..2 {
        tracker.record_failure(0);
    }
    // 70 - 40 = 30 < 50
    assert!(!tracker.is_usable(0));
}

#[test]
fn reset_restores_initial_score() {
    let tracker = HealthTracker::new(HealthConfig::default());
    tracker.record_failure(0);
    tracker.reset(0);
    assert_eq!(tracker.get_score(0), 70.0);
}

#[test]
fn score_is_bounded_after_every_write() {
    let tracker = HealthTracker::new(HealthConfig::default());
    tracker.record_rate_limit(1);
    let score = tracker.get_score(1);
    assert!((0.0..=100.0).contains(&score));
}

proptest! {
    /// Spec §8 property 2: after any sequence of writes, the score stays in
    /// `[0, max_score]`, and repeated reads without an intervening write
    /// never decrease (time-based recovery is monotonic non-negative).
    #[test]
    fn score_stays_bounded_across_arbitrary_write_sequences(
        ops in proptest::collection::vec(0u8..3, 0..30)
    ) {
        let tracker = HealthTracker::new(HealthConfig::default());
        for op in ops {
            match op {
                0 => tracker.record_success(0),
                1 => tracker.record_rate_limit(0),
                _ => tracker.record_failure(0),
            }
            let score = tracker.get_score(0);
            prop_assert!((0.0..=100.0).contains(&score));
        }

        let first_read = tracker.get_score(0);
        let second_read = tracker.get_score(0);
        prop_assert!(second_read >= first_read - 1e-9);
    }
}
