use proptest::prelude::*;
use tempfile::tempdir;

use super::*;
use crate::model::Account;

fn account(refresh_token: &str, last_used: u64) -> Account {
    Account {
        account_id: None,
        email: None,
        refresh_token: refresh_token.to_string(),
        access_token: None,
        access_token_expiry: None,
        added_at: 0,
        last_used,
        enabled: true,
        rate_limit_reset_time: None,
        rate_limit_reason: None,
        consecutive_failures: 0,
    }
}

#[test]
fn missing_file_yields_empty_storage() {
    let dir = tempdir().unwrap();
    let store = AccountStore::new(dir.path().join("accounts.json"));
    let set = store.load();
    assert!(set.accounts.is_empty());
    assert_eq!(set.active_index, 0);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let store = AccountStore::new(dir.path().join("accounts.json"));
    let set = AccountSet::new(vec![account("rt-1", 10), account("rt-2", 20)], 1);
    store.save(&set).unwrap();

    let loaded = store.load();
    assert_eq!(loaded.accounts.len(), 2);
    assert_eq!(loaded.active_index, 1);
    assert_eq!(loaded.accounts[0].refresh_token, "rt-1");
}

#[test]
fn load_dedupes_by_refresh_token_keeping_newest() {
    let dir = tempdir().unwrap();
    let store = AccountStore::new(dir.path().join("accounts.json"));
    let on_disk = OnDisk {
        version: 1,
        accounts: vec![
            StoredAccount::from(&account("rt-1", 10)),
            StoredAccount::from(&account("rt-1", 99)),
        ],
        active_index: 0,
    };
    let json = serde_json::to_string(&on_disk).unwrap();
    std::fs::write(store.path(), json).unwrap();

    let loaded = store.load();
    assert_eq!(loaded.accounts.len(), 1);
    assert_eq!(loaded.accounts[0].last_used, 99);
}

#[test]
fn load_clamps_active_index() {
    let dir = tempdir().unwrap();
    let store = AccountStore::new(dir.path().join("accounts.json"));
    let on_disk = OnDisk { version: 1, accounts: vec![StoredAccount::from(&account("rt-1", 1))], active_index: 99 };
    std::fs::write(store.path(), serde_json::to_string(&on_disk).unwrap()).unwrap();

    let loaded = store.load();
    assert_eq!(loaded.active_index, 0);
}

#[test]
fn corrupt_without_accounts_array_yields_empty_storage() {
    let dir = tempdir().unwrap();
    let store = AccountStore::new(dir.path().join("accounts.json"));
    std::fs::write(store.path(), r#"{"version":1}"#).unwrap();

    let loaded = store.load();
    assert!(loaded.accounts.is_empty());
}

#[test]
fn save_maintains_gitignore() {
    let dir = tempdir().unwrap();
    let store = AccountStore::new(dir.path().join("accounts.json"));
    store.save(&AccountSet::default()).unwrap();

    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains("codex-switch-accounts.json"));
    assert!(gitignore.contains("codex-switch-accounts.json.*.tmp"));
}

#[tokio::test]
async fn load_async_matches_sync_load() {
    let dir = tempdir().unwrap();
    let store = AccountStore::new(dir.path().join("accounts.json"));
    let set = AccountSet::new(vec![account("rt-1", 10)], 0);
    store.save(&set).unwrap();

    let loaded = store.load_async().await;
    assert_eq!(loaded.accounts.len(), 1);
}

proptest! {
    /// Spec §8 property 1: an already-deduplicated, clamped account set
    /// (as the Manager maintains in memory — unique `refresh_token`s) is
    /// bit-identical after a save + load round trip, for arbitrary sizes
    /// and active-index values.
    #[test]
    fn save_then_load_round_trips_for_arbitrary_unique_sets(
        count in 1usize..8,
        active_index in 0usize..10,
    ) {
        let dir = tempdir().unwrap();
        let store = AccountStore::new(dir.path().join("accounts.json"));

        let accounts: Vec<Account> =
            (0..count).map(|i| account(&format!("rt-{i}"), i as u64)).collect();
        let set = AccountSet::new(accounts, active_index);
        store.save(&set).unwrap();

        let loaded = store.load();
        prop_assert_eq!(loaded.accounts.len(), set.accounts.len());
        prop_assert_eq!(loaded.active_index, set.active_index);
        for (a, b) in loaded.accounts.iter().zip(set.accounts.iter()) {
            prop_assert_eq!(&a.refresh_token, &b.refresh_token);
            prop_assert_eq!(a.last_used, b.last_used);
        }
    }
}
