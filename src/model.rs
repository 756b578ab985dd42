// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model: accounts, the account set, and rate-limit reasons (spec §3).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One of the reason tags a failed upstream call can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateLimitReason {
    RateLimitExceeded,
    UsageLimitReached,
    ServerError,
    Unknown,
}

/// A single OAuth-linked ChatGPT identity plus its runtime penalty state.
///
/// `refresh_token` is the only field an `Account` may never be empty in:
/// the Store drops any entry that fails that invariant on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Absolute millisecond timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expiry: Option<u64>,

    pub added_at: u64,
    pub last_used: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_reset_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_reason: Option<RateLimitReason>,
    #[serde(default)]
    pub consecutive_failures: u32,
}

fn default_true() -> bool {
    true
}

impl Account {
    /// Build a fresh account from a just-completed OAuth exchange.
    pub fn new(refresh_token: String, access_token: Option<String>, expiry: Option<u64>) -> Self {
        let now = now_ms();
        Self {
            account_id: None,
            email: None,
            refresh_token,
            access_token,
            access_token_expiry: expiry,
            added_at: now,
            last_used: now,
            enabled: true,
            rate_limit_reset_time: None,
            rate_limit_reason: None,
            consecutive_failures: 0,
        }
    }

    /// Clear all penalty state (used when an account is re-added via OAuth).
    pub fn clear_penalties(&mut self) {
        self.rate_limit_reset_time = None;
        self.rate_limit_reason = None;
        self.consecutive_failures = 0;
    }
}

/// Two accounts are the same account iff their `refresh_token`s match, or
/// both `account_id`s are present and equal (spec §3 duplicate rule).
pub fn accounts_match(a: &Account, b: &Account) -> bool {
    if a.refresh_token == b.refresh_token {
        return true;
    }
    match (&a.account_id, &b.account_id) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// An ordered sequence of accounts plus the cursor used for sticky selection.
#[derive(Debug, Clone, Default)]
pub struct AccountSet {
    pub accounts: Vec<Account>,
    pub active_index: usize,
}

impl AccountSet {
    pub fn new(accounts: Vec<Account>, active_index: usize) -> Self {
        let mut set = Self { accounts, active_index };
        set.clamp_active_index();
        set
    }

    /// Clamp `active_index` into `[0, len)`, or to `0` when empty.
    pub fn clamp_active_index(&mut self) {
        if self.accounts.is_empty() {
            self.active_index = 0;
        } else if self.active_index >= self.accounts.len() {
            self.active_index = self.accounts.len() - 1;
        }
    }

    /// Merge `incoming` into the set, coalescing duplicates (spec §3: newest
    /// `last_used` wins) and preserving insertion order of first occurrence.
    pub fn dedup_merge(mut accounts: Vec<Account>) -> Vec<Account> {
        let mut merged: Vec<Account> = Vec::with_capacity(accounts.len());
        accounts.retain(|a| !a.refresh_token.is_empty());
        for incoming in accounts {
            if let Some(existing) = merged.iter_mut().find(|e| accounts_match(e, &incoming)) {
                if incoming.last_used >= existing.last_used {
                    *existing = incoming;
                }
            } else {
                merged.push(incoming);
            }
        }
        merged
    }
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
