// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-account wellness score with time-based recovery (spec §4.C).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::now_ms;

/// Tunables for the health tracker. Defaults match spec §4.C exactly.
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    pub initial: f64,
    pub max_score: f64,
    pub min_usable: f64,
    pub success_reward: f64,
    pub rate_limit_penalty: f64,
    pub failure_penalty: f64,
    pub recovery_rate_per_hour: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            initial: 70.0,
            max_score: 100.0,
            min_usable: 50.0,
            success_reward: 1.0,
            rate_limit_penalty: -10.0,
            failure_penalty: -20.0,
            recovery_rate_per_hour: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HealthEntry {
    score: f64,
    last_updated: u64,
}

/// Per-account-index health state, guarded by a single mutex (spec §5: the
/// read-modify-write of a health score must be atomic per account; one lock
/// over the whole map is simplest and the map is small).
pub struct HealthTracker {
    config: HealthConfig,
    entries: Mutex<HashMap<usize, HealthEntry>>,
}

impl HealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        Self { config, entries: Mutex::new(HashMap::new()) }
    }

    /// Effective score on read: stored score plus linear recovery since
    /// `last_updated`, capped at `max_score`. Does not persist the recovery.
    pub fn get_score(&self, index: usize) -> f64 {
        let entries = self.entries.lock();
        self.effective_score(&entries, index)
    }

    pub fn is_usable(&self, index: usize) -> bool {
        self.get_score(index) >= self.config.min_usable
    }

    pub fn record_success(&self, index: usize) {
        self.apply_delta(index, self.config.success_reward);
    }

    pub fn record_rate_limit(&self, index: usize) {
        self.apply_delta(index, self.config.rate_limit_penalty);
    }

    pub fn record_failure(&self, index: usize) {
        self.apply_delta(index, self.config.failure_penalty);
    }

    pub fn reset(&self, index: usize) {
        let mut entries = self.entries.lock();
        entries.insert(index, HealthEntry { score: self.config.initial, last_updated: now_ms() });
    }

    fn apply_delta(&self, index: usize, delta: f64) {
        let mut entries = self.entries.lock();
        let current = self.effective_score(&entries, index);
        let updated = (current + delta).clamp(0.0, self.config.max_score);
        entries.insert(index, HealthEntry { score: updated, last_updated: now_ms() });
    }

    fn effective_score(&self, entries: &HashMap<usize, HealthEntry>, index: usize) -> f64 {
        let entry = match entries.get(&index) {
            Some(e) => *e,
            None => return self.config.initial,
        };
        let elapsed_hours = (now_ms().saturating_sub(entry.last_updated)) as f64 / 3_600_000.0;
        let recovered = entry.score + (elapsed_hours * self.config.recovery_rate_per_hour).floor();
        recovered.min(self.config.max_score).max(0.0)
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
