// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the account set; coordinates Store/Health/Bucket/Selector; records
//! outcomes (spec §4.F).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::bucket::{BucketConfig, TokenBucket};
use crate::health::{HealthConfig, HealthTracker};
use crate::model::{Account, AccountSet, RateLimitReason, now_ms};
use crate::selector::{AccountMetrics, SelectionStrategy, Selector};
use crate::store::AccountStore;
use crate::token_service::TokenService;

const MAX_CONSECUTIVE_FAILURES: u32 = 5;
const REFRESH_MARGIN_MS: u64 = 60_000;
const DEBOUNCE_SAVE: Duration = Duration::from_secs(1);

/// An account selected for the current attempt, paired with its slot index.
#[derive(Debug, Clone)]
pub struct ActiveAccount {
    pub index: usize,
    pub account: Account,
}

/// Redacted, host-facing view of one account (no tokens).
#[derive(Debug, Clone)]
pub struct AccountStatusView {
    pub index: usize,
    pub account_id: Option<String>,
    pub email: Option<String>,
    pub enabled: bool,
    pub health_score: f64,
    pub tokens: f64,
    pub is_rate_limited: bool,
    pub consecutive_failures: u32,
}

pub struct AccountManager {
    store: Arc<AccountStore>,
    token_service: TokenService,
    health: HealthTracker,
    bucket: TokenBucket,
    strategy: SelectionStrategy,
    state: Arc<RwLock<AccountSet>>,
    pending_save: Mutex<Option<JoinHandle<()>>>,
}

impl AccountManager {
    pub fn new(
        store: AccountStore,
        token_service: TokenService,
        health_config: HealthConfig,
        bucket_config: BucketConfig,
        strategy: SelectionStrategy,
    ) -> Self {
        let initial = store.load();
        Self {
            store: Arc::new(store),
            token_service,
            health: HealthTracker::new(health_config),
            bucket: TokenBucket::new(bucket_config),
            strategy,
            state: Arc::new(RwLock::new(initial)),
            pending_save: Mutex::new(None),
        }
    }

    /// Add or update an account from a freshly exchanged token triple.
    ///
    /// Re-loads from disk first (the OAuth flow may complete before the
    /// process has loaded anything), decodes identity claims, coalesces
    /// against an existing match, and saves synchronously.
    pub async fn add_account(
        &self,
        access_token: String,
        refresh_token: String,
        access_token_expiry: Option<u64>,
    ) -> usize {
        let claims = self.token_service.decode_identity_claims(&access_token);

        let mut state = self.state.write().await;
        *state = self.store.load_async().await;

        let now = now_ms();
        let existing = state.accounts.iter().position(|a| {
            a.refresh_token == refresh_token
                || matches!((&a.account_id, &claims.account_id), (Some(x), Some(y)) if x == y)
        });

        let index = if let Some(idx) = existing {
            let account = &mut state.accounts[idx];
            account.refresh_token = refresh_token;
            account.access_token = Some(access_token);
            account.access_token_expiry = access_token_expiry;
            if claims.account_id.is_some() {
                account.account_id = claims.account_id;
            }
            if claims.email.is_some() {
                account.email = claims.email;
            }
            account.enabled = true;
            account.last_used = now;
            account.clear_penalties();
            self.health.reset(idx);
            idx
        } else {
            let mut account = Account::new(refresh_token, Some(access_token), access_token_expiry);
            account.account_id = claims.account_id;
            account.email = claims.email;
            state.accounts.push(account);
            let idx = state.accounts.len() - 1;
            if idx == 0 {
                state.active_index = 0;
            }
            idx
        };

        self.store.save(&state).ok();
        index
    }

    /// Select the next account to use for this attempt. Returns `None` only
    /// when the account set is empty or every enabled account has no
    /// reset-time to fall back on (i.e. `NO_ACCOUNTS`).
    pub async fn select_account(&self) -> Option<ActiveAccount> {
        let mut state = self.state.write().await;
        if state.accounts.is_empty() {
            return None;
        }

        let now = now_ms();
        let metrics: Vec<AccountMetrics> = state
            .accounts
            .iter()
            .enumerate()
            .map(|(index, a)| AccountMetrics {
                index,
                last_used: a.last_used,
                health_score: self.health.get_score(index),
                is_rate_limited: is_rate_limited_read(a, now),
                enabled: a.enabled,
            })
            .collect();

        let active = if state.accounts.is_empty() { None } else { Some(state.active_index) };
        let selector = Selector::new(self.strategy);
        let picked = selector.select(&metrics, &self.bucket, active, now);

        let chosen = match picked {
            Some(idx) => idx,
            None => self.fallback_least_reset(&state.accounts)?,
        };

        if chosen != state.active_index {
            tracing::info!(from = state.active_index, to = chosen, "active account changed");
        }
        state.active_index = chosen;

        Some(ActiveAccount { index: chosen, account: state.accounts[chosen].clone() })
    }

    fn fallback_least_reset(&self, accounts: &[Account]) -> Option<usize> {
        accounts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.enabled)
            .min_by_key(|(idx, a)| (a.rate_limit_reset_time.unwrap_or(0), *idx))
            .map(|(idx, _)| idx)
    }

    /// Ensure the selected account has a usable access token, refreshing if
    /// it is absent or expires within 60s. Returns `None` on refresh failure
    /// (after recording the failure against the account).
    pub async fn ensure_access_token(&self, selected: &ActiveAccount) -> Option<ActiveAccount> {
        let now = now_ms();
        let fresh = selected
            .account
            .access_token
            .is_some()
            .then(|| selected.account.access_token_expiry)
            .flatten()
            .map(|expiry| expiry > now + REFRESH_MARGIN_MS)
            .unwrap_or(false);

        if fresh {
            return Some(selected.clone());
        }

        match self.token_service.refresh(&selected.account.refresh_token).await {
            Ok(tokens) => {
                let mut state = self.state.write().await;
                let Some(account) = state.accounts.get_mut(selected.index) else {
                    return None;
                };
                account.access_token = Some(tokens.access_token.clone());
                account.refresh_token = tokens.refresh_token;
                account.access_token_expiry = Some(tokens.access_token_expiry);
                if account.account_id.is_none() {
                    let claims = self.token_service.decode_identity_claims(&tokens.access_token);
                    account.account_id = claims.account_id;
                    if account.email.is_none() {
                        account.email = claims.email;
                    }
                }
                let updated = account.clone();
                drop(state);
                self.schedule_save();
                Some(ActiveAccount { index: selected.index, account: updated })
            }
            Err(e) => {
                tracing::warn!(index = selected.index, err = %e, "token refresh failed");
                self.record_failure(selected.index).await;
                None
            }
        }
    }

    pub async fn record_success(&self, index: usize) {
        {
            let mut state = self.state.write().await;
            if let Some(account) = state.accounts.get_mut(index) {
                account.last_used = now_ms();
                account.consecutive_failures = 0;
            }
        }
        self.health.record_success(index);
        self.bucket.consume(index, 1.0);
        self.schedule_save();
    }

    pub async fn mark_rate_limited(&self, index: usize, reason: RateLimitReason) {
        let mut state = self.state.write().await;
        let Some(account) = state.accounts.get_mut(index) else { return };
        let backoff = backoff_for(reason, account.consecutive_failures);
        account.rate_limit_reset_time = Some(now_ms() + backoff);
        account.rate_limit_reason = Some(reason);
        account.consecutive_failures += 1;
        drop(state);
        self.health.record_rate_limit(index);
        self.schedule_save();
    }

    pub async fn record_failure(&self, index: usize) {
        let disabled;
        {
            let mut state = self.state.write().await;
            let Some(account) = state.accounts.get_mut(index) else { return };
            account.consecutive_failures += 1;
            disabled = account.consecutive_failures >= MAX_CONSECUTIVE_FAILURES;
            if disabled {
                account.enabled = false;
            }
        }
        self.health.record_failure(index);
        if disabled {
            tracing::warn!(index, "account disabled after repeated failures");
        }
        self.schedule_save();
    }

    /// Check (and, as a side effect, clear) an account's rate-limit state.
    pub async fn is_rate_limited(&self, index: usize) -> bool {
        let mut state = self.state.write().await;
        let Some(account) = state.accounts.get_mut(index) else { return false };
        let now = now_ms();
        match account.rate_limit_reset_time {
            None => false,
            Some(reset) if now >= reset => {
                account.rate_limit_reset_time = None;
                account.rate_limit_reason = None;
                false
            }
            Some(_) => true,
        }
    }

    pub async fn status_list(&self) -> Vec<AccountStatusView> {
        let state = self.state.read().await;
        let now = now_ms();
        state
            .accounts
            .iter()
            .enumerate()
            .map(|(index, a)| AccountStatusView {
                index,
                account_id: a.account_id.clone(),
                email: a.email.clone(),
                enabled: a.enabled,
                health_score: self.health.get_score(index),
                tokens: self.bucket.get_tokens(index),
                is_rate_limited: is_rate_limited_read(a, now),
                consecutive_failures: a.consecutive_failures,
            })
            .collect()
    }

    /// Arm (or re-arm) the debounced save: coalesces writes within 1s
    /// (Design Note "Debounced persistence" — single pending task per
    /// Manager, cancel-and-rearm on every call).
    fn schedule_save(&self) {
        let mut pending = self.pending_save.lock();
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE_SAVE).await;
            let guard = state.read().await;
            let _ = store.save(&guard);
        });
        *pending = Some(handle);
    }

    /// Flush any pending debounced save synchronously (process shutdown).
    pub async fn flush(&self) {
        let handle = self.pending_save.lock().take();
        if let Some(handle) = handle {
            handle.abort();
        }
        let state = self.state.read().await;
        let _ = self.store.save(&state);
    }
}

fn is_rate_limited_read(account: &Account, now: u64) -> bool {
    match account.rate_limit_reset_time {
        Some(reset) => now < reset,
        None => false,
    }
}

/// Backoff table (spec §4.F). Minimum clamp 2s.
fn backoff_for(reason: RateLimitReason, consecutive_failures: u32) -> u64 {
    const USAGE_LIMIT_ESCALATION_MS: [u64; 3] = [60_000, 300_000, 1_800_000];
    let raw = match reason {
        RateLimitReason::UsageLimitReached => {
            USAGE_LIMIT_ESCALATION_MS[(consecutive_failures as usize).min(2)]
        }
        RateLimitReason::RateLimitExceeded => 30_000,
        RateLimitReason::ServerError => 20_000,
        RateLimitReason::Unknown => 60_000,
    };
    raw.max(2_000)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
