// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! codex-switch: a multi-account gateway that intercepts outbound traffic to
//! the vendor's ChatGPT-Codex "responses" API, authenticates each call on
//! behalf of one of several OAuth-linked ChatGPT identities, and rotates
//! among them on rate-limit or quota exhaustion.
//!
//! The crate is embedded as a request interceptor inside a host agent; from
//! the host's perspective [`interceptor::Gateway::intercept`] is an opaque
//! fetch function that takes a model-call request and returns a streaming
//! response. Everything else here — the account pool, health scoring, token
//! buckets, selection policy, request/response transformation — is internal
//! machinery in service of that one call.

pub mod bucket;
pub mod classifier;
pub mod config;
pub mod error;
pub mod health;
pub mod interceptor;
pub mod manager;
pub mod model;
pub mod normalizer;
pub mod selector;
pub mod sinks;
pub mod sse;
pub mod store;
pub mod token_service;
pub mod transformer;

use std::sync::Arc;

use crate::bucket::BucketConfig;
use crate::config::{GatewayArgs, ResolvedConfig};
use crate::health::HealthConfig;
use crate::interceptor::Gateway;
use crate::manager::AccountManager;
use crate::sinks::{FileRequestLogSink, RequestLogSink};
use crate::store::AccountStore;
use crate::token_service::TokenService;
use crate::transformer::TransformConfig;

/// Build a fully wired [`Gateway`] from resolved configuration and CLI args.
/// This is the composition root a host embeds at startup; nothing else in
/// the crate reaches for environment variables or the filesystem on its own
/// behalf once construction has happened (Design Note "Global state").
pub fn build_gateway(args: &GatewayArgs, resolved: &ResolvedConfig, host_name: impl Into<String>) -> Gateway {
    let http = reqwest::Client::builder().build().unwrap_or_default();

    let storage_path = args.storage_path.clone().unwrap_or_else(store::storage_path);
    let store = AccountStore::new(storage_path);
    let token_service = TokenService::new(http.clone(), args.token_url.clone(), args.client_id.clone());
    let manager = Arc::new(AccountManager::new(
        store,
        token_service,
        HealthConfig::default(),
        BucketConfig::default(),
        resolved.strategy,
    ));

    let mut transform_config = TransformConfig::codex(host_name);
    transform_config.codex_mode = resolved.codex_mode;

    let mut gateway = Gateway::new(manager, http, transform_config);
    if resolved.request_logging {
        let sink: Arc<dyn RequestLogSink> = Arc::new(FileRequestLogSink::at_default_path());
        gateway = gateway.with_request_log(sink);
    }
    gateway
}

/// Build the process-wide `tracing` subscriber. Debug logging
/// (`DEBUG_CODEX_SWITCH=1`, spec §6) raises the default filter to `debug`
/// for this crate's own target rather than globally, so a noisy dependency
/// doesn't drown out operator-facing logs.
pub fn init_tracing(resolved: &ResolvedConfig) {
    let default_directive = if resolved.debug { "info,codex_switch=debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
