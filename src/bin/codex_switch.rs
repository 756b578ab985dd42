// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codex-switch` — operational CLI for inspecting and seeding the account
//! pool without driving a live OAuth dance (that flow is out of scope for
//! this crate, per spec §1; this binary accepts an already-obtained token
//! triple instead).

use clap::{Parser, Subcommand};
use codex_switch::config::{GatewayArgs, ResolvedConfig};
use codex_switch::model::now_ms;
use codex_switch::store::AccountStore;

#[derive(Parser)]
#[command(name = "codex-switch", version, about = "Multi-account ChatGPT-Codex gateway.")]
struct Cli {
    #[command(flatten)]
    gateway: GatewayArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the account pool.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },
}

#[derive(Subcommand)]
enum AccountsCommand {
    /// List accounts with a redacted status view.
    List,
    /// Seed an account from a pre-obtained token triple (no OAuth dance).
    AddStub {
        /// Access token.
        #[arg(long)]
        access_token: String,
        /// Refresh token.
        #[arg(long)]
        refresh_token: String,
        /// Seconds until the access token expires.
        #[arg(long)]
        expires_in: Option<u64>,
    },
    /// Enable a previously disabled account by index.
    Enable {
        index: usize,
    },
    /// Disable an account by index.
    Disable {
        index: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let resolved = ResolvedConfig::resolve();
    codex_switch::init_tracing(&resolved);

    let exit_code = match cli.command {
        Commands::Accounts { command } => run_accounts(&cli.gateway, command).await,
    };
    std::process::exit(exit_code);
}

async fn run_accounts(gateway_args: &GatewayArgs, command: AccountsCommand) -> i32 {
    let storage_path = gateway_args.storage_path.clone().unwrap_or_else(codex_switch::store::storage_path);
    let store = AccountStore::new(storage_path);

    match command {
        AccountsCommand::List => {
            let set = store.load_async().await;
            if set.accounts.is_empty() {
                println!("no accounts configured");
                return 0;
            }
            for (index, account) in set.accounts.iter().enumerate() {
                let active = if index == set.active_index { "*" } else { " " };
                println!(
                    "{active} [{index}] {} enabled={} failures={} rate_limited_until={}",
                    account.email.as_deref().or(account.account_id.as_deref()).unwrap_or("<unknown>"),
                    account.enabled,
                    account.consecutive_failures,
                    account.rate_limit_reset_time.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
                );
            }
            0
        }
        AccountsCommand::AddStub { access_token, refresh_token, expires_in } => {
            let mut set = store.load_async().await;
            let expiry = expires_in.map(|secs| now_ms() + secs.saturating_mul(1000));
            let mut account =
                codex_switch::model::Account::new(refresh_token, Some(access_token), expiry);
            let is_first = set.accounts.is_empty();
            account.last_used = now_ms();
            set.accounts.push(account);
            if is_first {
                set.active_index = 0;
            }
            match store.save(&set) {
                Ok(()) => {
                    println!("added account at index {}", set.accounts.len() - 1);
                    0
                }
                Err(e) => {
                    eprintln!("error: failed to save account store: {e}");
                    1
                }
            }
        }
        AccountsCommand::Enable { index } => set_enabled(&store, index, true).await,
        AccountsCommand::Disable { index } => set_enabled(&store, index, false).await,
    }
}

async fn set_enabled(store: &AccountStore, index: usize, enabled: bool) -> i32 {
    let mut set = store.load_async().await;
    let Some(account) = set.accounts.get_mut(index) else {
        eprintln!("error: no account at index {index}");
        return 2;
    };
    account.enabled = enabled;
    match store.save(&set) {
        Ok(()) => {
            println!("account {index} enabled={enabled}");
            0
        }
        Err(e) => {
            eprintln!("error: failed to save account store: {e}");
            1
        }
    }
}
