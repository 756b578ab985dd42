// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable, atomic, deduplicating persistence of the account set (spec §4.B).
//!
//! A pure value-in/value-out module (Design Note "Cyclic dependency between
//! Manager and Store"): it never holds a reference back to the Manager.

use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{Account, AccountSet, RateLimitReason};

const STORAGE_FILE: &str = "codex-switch-accounts.json";
const SCHEMA_VERSION: u32 = 1;

/// On-disk shape of an [`Account`], identical except it carries no runtime index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
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

impl From<&Account> for StoredAccount {
    fn from(a: &Account) -> Self {
        Self {
            account_id: a.account_id.clone(),
            email: a.email.clone(),
            refresh_token: a.refresh_token.clone(),
            access_token: a.access_token.clone(),
            access_token_expiry: a.access_token_expiry,
            added_at: a.added_at,
            last_used: a.last_used,
            enabled: a.enabled,
            rate_limit_reset_time: a.rate_limit_reset_time,
            rate_limit_reason: a.rate_limit_reason,
            consecutive_failures: a.consecutive_failures,
        }
    }
}

impl From<StoredAccount> for Account {
    fn from(s: StoredAccount) -> Self {
        Account {
            account_id: s.account_id,
            email: s.email,
            refresh_token: s.refresh_token,
            access_token: s.access_token,
            access_token_expiry: s.access_token_expiry,
            added_at: s.added_at,
            last_used: s.last_used,
            enabled: s.enabled,
            rate_limit_reset_time: s.rate_limit_reset_time,
            rate_limit_reason: s.rate_limit_reason,
            consecutive_failures: s.consecutive_failures,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OnDisk {
    version: u32,
    accounts: Vec<StoredAccount>,
    #[serde(rename = "activeIndex", default)]
    active_index: usize,
}

/// Resolve `<config-dir>/codex-switch-accounts.json` (spec §6).
///
/// `config-dir` is `$OPENCODE_CONFIG_DIR` if set, else `$XDG_CONFIG_HOME/opencode`
/// (default `~/.config/opencode`).
pub fn storage_path() -> PathBuf {
    config_dir().join(STORAGE_FILE)
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OPENCODE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("opencode");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config/opencode");
    }
    PathBuf::from(".config/opencode")
}

/// Pure value-in/value-out persistence for the account set.
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn at_default_path() -> Self {
        Self::new(storage_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous load. Absent file yields empty storage; malformed-but-parseable
    /// JSON lacking an `accounts` array yields empty storage (`STORAGE_CORRUPT`,
    /// recovered locally per spec §7).
    pub fn load(&self) -> AccountSet {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return AccountSet::default();
        };
        Self::parse(&contents)
    }

    /// Async load, identical semantics to [`Self::load`].
    pub async fn load_async(&self) -> AccountSet {
        let Ok(contents) = tokio::fs::read_to_string(&self.path).await else {
            return AccountSet::default();
        };
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> AccountSet {
        let parsed: serde_json::Value = match serde_json::from_str(contents) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(err = %e, "account store corrupt, starting empty");
                return AccountSet::default();
            }
        };
        let Some(on_disk) = parsed
            .as_object()
            .filter(|obj| obj.contains_key("accounts"))
            .and_then(|_| serde_json::from_value::<OnDisk>(parsed.clone()).ok())
        else {
            tracing::warn!("account store missing accounts array, starting empty");
            return AccountSet::default();
        };

        let accounts: Vec<Account> = on_disk.accounts.into_iter().map(Account::from).collect();
        let accounts = AccountSet::dedup_merge(accounts);
        AccountSet::new(accounts, on_disk.active_index)
    }

    /// Serialize with stable indentation, write to a randomly-suffixed temp
    /// file, then atomically rename over the target. Ensures the parent
    /// directory exists and best-effort maintains a `.gitignore`.
    pub fn save(&self, set: &AccountSet) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let on_disk = OnDisk {
            version: SCHEMA_VERSION,
            accounts: set.accounts.iter().map(StoredAccount::from).collect(),
            active_index: set.active_index,
        };
        let json = serde_json::to_string_pretty(&on_disk)?;

        let tmp_path = self.tmp_path();
        let result = std::fs::write(&tmp_path, &json).and_then(|_| std::fs::rename(&tmp_path, &self.path));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        self.maintain_gitignore();
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let suffix: u64 = rand::rng().random();
        let file_name = self.path.file_name().and_then(|n| n.to_str()).unwrap_or(STORAGE_FILE);
        self.path.with_file_name(format!("{file_name}.{suffix:x}.tmp"))
    }

    fn maintain_gitignore(&self) {
        let Some(parent) = self.path.parent() else { return };
        let gitignore_path = parent.join(".gitignore");
        let entries = [STORAGE_FILE.to_string(), format!("{STORAGE_FILE}.*.tmp")];

        let existing = std::fs::read_to_string(&gitignore_path).unwrap_or_default();
        let missing: Vec<&str> = entries
            .iter()
            .map(String::as_str)
            .filter(|e| !existing.lines().any(|line| line.trim() == *e))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        for entry in missing {
            updated.push_str(entry);
            updated.push('\n');
        }
        // Best-effort: a failure here must never affect the request path.
        let _ = std::fs::write(&gitignore_path, updated);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
