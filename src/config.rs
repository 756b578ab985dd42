// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loading: the plugin configuration file and environment
//! variable overrides (spec §6), plus the `clap::Args` surface for the
//! standalone inspection binary (`src/bin/codex_switch.rs`).
//!
//! Design Note "Global state" (spec §9): the configured strategy and the
//! feature-flag environment variables are process-wide constants, read
//! once at construction — nothing here is re-read per request.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::selector::SelectionStrategy;

/// `<home>/.opencode/codex-switch-config.json` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfigFile {
    #[serde(default = "default_codex_mode")]
    pub codex_mode: bool,
    #[serde(default = "default_strategy_name")]
    pub strategy: String,
    #[serde(default)]
    pub debug: bool,
}

fn default_codex_mode() -> bool {
    true
}

fn default_strategy_name() -> String {
    "hybrid".to_string()
}

impl Default for PluginConfigFile {
    fn default() -> Self {
        Self { codex_mode: default_codex_mode(), strategy: default_strategy_name(), debug: false }
    }
}

impl PluginConfigFile {
    pub fn path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".opencode/codex-switch-config.json")
    }

    /// Load the plugin config file, falling back to defaults if absent or
    /// unparsable (this file is operator convenience, never load-bearing).
    pub fn load() -> Self {
        let path = Self::path();
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(err = %e, path = %path.display(), "plugin config file malformed, using defaults");
                Self::default()
            }
        }
    }
}

/// Fully resolved, process-wide configuration: file + environment overrides,
/// applied once (Design Note "Global state").
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub codex_mode: bool,
    pub strategy: SelectionStrategy,
    pub debug: bool,
    pub request_logging: bool,
}

impl ResolvedConfig {
    /// Resolve from the plugin config file plus environment variables
    /// (spec §6): `CODEX_MODE` (`"1"`/`"0"` overrides the file),
    /// `DEBUG_CODEX_SWITCH` (`"1"` enables debug logging),
    /// `ENABLE_PLUGIN_REQUEST_LOGGING` (`"1"` enables per-request dumps).
    pub fn resolve() -> Self {
        let file = PluginConfigFile::load();
        Self::from_file_and_env(file, |key| std::env::var(key).ok())
    }

    fn from_file_and_env(file: PluginConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let codex_mode = match env("CODEX_MODE").as_deref() {
            Some("1") => true,
            Some("0") => false,
            _ => file.codex_mode,
        };
        let debug = env("DEBUG_CODEX_SWITCH").as_deref() == Some("1") || file.debug;
        let request_logging = env("ENABLE_PLUGIN_REQUEST_LOGGING").as_deref() == Some("1");
        let strategy = parse_strategy(&file.strategy);

        Self { codex_mode, strategy, debug, request_logging }
    }
}

fn parse_strategy(name: &str) -> SelectionStrategy {
    match name {
        "sticky" => SelectionStrategy::Sticky,
        "round-robin" => SelectionStrategy::RoundRobin,
        "hybrid" => SelectionStrategy::Hybrid,
        other => {
            tracing::warn!(strategy = other, "unknown strategy, falling back to hybrid");
            SelectionStrategy::Hybrid
        }
    }
}

/// `clap::Args` surface for the standalone inspection binary. Not used by
/// the embedded interceptor itself (the host wires that up directly), only
/// by `codex-switch`'s own process entry point.
#[derive(Debug, Clone, clap::Args)]
pub struct GatewayArgs {
    /// Vendor OAuth token endpoint.
    #[arg(long, env = "CODEX_SWITCH_TOKEN_URL", default_value = "https://auth.openai.com/oauth/token")]
    pub token_url: String,

    /// OAuth client id used for token exchange/refresh.
    #[arg(long, env = "CODEX_SWITCH_CLIENT_ID", default_value = "app_codex_cli")]
    pub client_id: String,

    /// Override the account store path (defaults to the spec §6 resolution).
    #[arg(long, env = "CODEX_SWITCH_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codex_mode_env_overrides_file_either_direction() {
        let file = PluginConfigFile { codex_mode: false, strategy: "hybrid".to_string(), debug: false };
        let resolved = ResolvedConfig::from_file_and_env(file.clone(), |k| {
            if k == "CODEX_MODE" { Some("1".to_string()) } else { None }
        });
        assert!(resolved.codex_mode);

        let file_on = PluginConfigFile { codex_mode: true, ..file };
        let resolved = ResolvedConfig::from_file_and_env(file_on, |k| {
            if k == "CODEX_MODE" { Some("0".to_string()) } else { None }
        });
        assert!(!resolved.codex_mode);
    }

    #[test]
    fn defaults_match_spec() {
        let resolved = ResolvedConfig::from_file_and_env(PluginConfigFile::default(), |_| None);
        assert!(resolved.codex_mode);
        assert_eq!(resolved.strategy, SelectionStrategy::Hybrid);
        assert!(!resolved.debug);
        assert!(!resolved.request_logging);
    }

    #[test]
    fn debug_env_flag_enables_regardless_of_file() {
        let resolved = ResolvedConfig::from_file_and_env(PluginConfigFile::default(), |k| {
            if k == "DEBUG_CODEX_SWITCH" { Some("1".to_string()) } else { None }
        });
        assert!(resolved.debug);
    }
}
