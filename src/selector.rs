// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy layer over a snapshot of account metrics (spec §4.E).

use crate::bucket::TokenBucket;

/// Point-in-time view of one account, as seen by the Selector.
#[derive(Debug, Clone, Copy)]
pub struct AccountMetrics {
    pub index: usize,
    /// Milliseconds since epoch.
    pub last_used: u64,
    pub health_score: f64,
    pub is_rate_limited: bool,
    pub enabled: bool,
}

/// Selection policy. Hybrid is the default and the only strategy with real
/// scoring; Sticky/RoundRobin are simple filter-then-pick passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    Sticky,
    RoundRobin,
    Hybrid,
}

const MIN_HEALTH_SCORE: f64 = 50.0;
const STICKINESS_BONUS: f64 = 150.0;
const SWITCH_THRESHOLD: f64 = 100.0;

pub struct Selector {
    strategy: SelectionStrategy,
}

impl Selector {
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self { strategy }
    }

    /// Select the next account index, given the current metrics snapshot,
    /// the token bucket, and the current active index. `now_ms` is the
    /// caller's notion of "now" (injectable for deterministic tests).
    ///
    /// Returns `None` when no account satisfies the strategy's filter; the
    /// Manager then falls back to least-future-reset-time selection.
    pub fn select(
        &self,
        metrics: &[AccountMetrics],
        bucket: &TokenBucket,
        active_index: Option<usize>,
        now_ms: u64,
    ) -> Option<usize> {
        // Single-account mode forces sticky regardless of configuration.
        if metrics.len() == 1 {
            return Self::sticky(metrics, active_index);
        }

        match self.strategy {
            SelectionStrategy::Sticky => Self::sticky(metrics, active_index),
            SelectionStrategy::RoundRobin => Self::round_robin(metrics, active_index),
            SelectionStrategy::Hybrid => self.hybrid(metrics, bucket, active_index, now_ms),
        }
    }

    fn sticky(metrics: &[AccountMetrics], active_index: Option<usize>) -> Option<usize> {
        let filtered: Vec<&AccountMetrics> = metrics.iter().filter(|m| Self::base_eligible(m)).collect();
        if let Some(active) = active_index {
            if filtered.iter().any(|m| m.index == active) {
                return Some(active);
            }
        }
        filtered.first().map(|m| m.index)
    }

    fn round_robin(metrics: &[AccountMetrics], active_index: Option<usize>) -> Option<usize> {
        let filtered: Vec<&AccountMetrics> = metrics.iter().filter(|m| Self::base_eligible(m)).collect();
        if filtered.is_empty() {
            return None;
        }
        let Some(active) = active_index else {
            return Some(filtered[0].index);
        };
        match filtered.iter().position(|m| m.index == active) {
            Some(pos) => Some(filtered[(pos + 1) % filtered.len()].index),
            None => Some(filtered[0].index),
        }
    }

    fn hybrid(
        &self,
        metrics: &[AccountMetrics],
        bucket: &TokenBucket,
        active_index: Option<usize>,
        now_ms: u64,
    ) -> Option<usize> {
        let max_tokens = bucket.max_tokens();
        let candidates: Vec<(AccountMetrics, f64, f64)> = metrics
            .iter()
            .filter(|m| m.enabled && !m.is_rate_limited && m.health_score >= MIN_HEALTH_SCORE)
            .filter_map(|m| {
                let tokens = bucket.get_tokens(m.index);
                if tokens < 1.0 {
                    return None;
                }
                let base = Self::base_score(m, tokens, max_tokens, now_ms);
                let is_active = active_index == Some(m.index);
                let score = base + if is_active { STICKINESS_BONUS } else { 0.0 };
                Some((*m, base, score))
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let mut ranked = candidates;
        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal).then(a.0.index.cmp(&b.0.index))
        });
        let (best, best_base, _) = ranked[0];

        let Some(active) = active_index else {
            return Some(best.index);
        };
        if best.index == active {
            return Some(active);
        }

        match ranked.iter().find(|(m, _, _)| m.index == active) {
            Some((_, active_base, _)) => {
                if best_base - active_base > SWITCH_THRESHOLD {
                    Some(best.index)
                } else {
                    Some(active)
                }
            }
            // Active account did not pass the candidate filter; it is
            // disqualified, so there is nothing to anti-flap against.
            None => Some(best.index),
        }
    }

    fn base_score(m: &AccountMetrics, tokens: f64, max_tokens: f64, now_ms: u64) -> f64 {
        let seconds_since_last_used = (now_ms.saturating_sub(m.last_used)) as f64 / 1000.0;
        let token_pct = 100.0 * tokens / max_tokens;
        2.0 * m.health_score + 5.0 * token_pct + 0.1 * seconds_since_last_used.min(3600.0)
    }

    fn base_eligible(m: &AccountMetrics) -> bool {
        m.enabled && !m.is_rate_limited
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
