// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host sink interfaces (spec §6): best-effort, fire-and-forget callbacks
//! into the embedding host. None of these are implemented here beyond a
//! no-op default and, for request logging, a simple file-backed writer —
//! the host supplies its own implementations at construction time.

use serde_json::Value;

use crate::model::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// `(message, variant, duration_ms)` toast callback.
pub trait ToastSink: Send + Sync {
    fn toast(&self, message: &str, variant: ToastVariant, duration_ms: u64);
}

/// `(service, level, message)` structured-log callback.
pub trait HostLogSink: Send + Sync {
    fn log(&self, service: &str, level: LogLevel, message: &str);
}

/// Credentials to persist back into the host's own auth store.
#[derive(Debug, Clone)]
pub struct AuthWriteback {
    pub access: String,
    pub refresh: String,
    pub expires: u64,
    pub account_id: Option<String>,
}

/// `(provider_id, { access, refresh, expires, accountId })` writeback callback.
pub trait AuthWritebackSink: Send + Sync {
    fn write_back(&self, provider_id: &str, creds: &AuthWriteback);
}

/// A no-op sink, used whenever the host does not wire one up. A failure in
/// any sink must never affect the request path, so "no sink configured"
/// and "sink configured but failing" look identical from the core's side.
pub struct NoopSink;

impl ToastSink for NoopSink {
    fn toast(&self, _message: &str, _variant: ToastVariant, _duration_ms: u64) {}
}

impl HostLogSink for NoopSink {
    fn log(&self, _service: &str, _level: LogLevel, _message: &str) {}
}

impl AuthWritebackSink for NoopSink {
    fn write_back(&self, _provider_id: &str, _creds: &AuthWriteback) {}
}

/// One entry written by the per-request JSON dump sink
/// (`ENABLE_PLUGIN_REQUEST_LOGGING`, §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct RequestLogRecord {
    pub timestamp_ms: u64,
    pub account_id: Option<String>,
    pub transformed_body: Value,
    pub outcome: String,
}

/// Sink for per-request JSON dumps.
pub trait RequestLogSink: Send + Sync {
    fn log_request(&self, record: RequestLogRecord);
}

impl RequestLogSink for NoopSink {
    fn log_request(&self, _record: RequestLogRecord) {}
}

/// Writes each record to `~/.opencode/logs/codex-auto-switch/<timestamp>-<account>.json`.
pub struct FileRequestLogSink {
    dir: std::path::PathBuf,
}

impl FileRequestLogSink {
    pub fn new(dir: std::path::PathBuf) -> Self {
        Self { dir }
    }

    pub fn at_default_path() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(std::path::PathBuf::from(home).join(".opencode/logs/codex-auto-switch"))
    }
}

impl RequestLogSink for FileRequestLogSink {
    fn log_request(&self, record: RequestLogRecord) {
        let account = record.account_id.clone().unwrap_or_else(|| "unknown".to_string());
        let file_name = format!("{}-{account}.json", record.timestamp_ms);
        if std::fs::create_dir_all(&self.dir).is_err() {
            return;
        }
        let Ok(json) = serde_json::to_string_pretty(&record) else { return };
        // Best-effort: a failure here must never affect the request path.
        let _ = std::fs::write(self.dir.join(file_name), json);
    }
}

/// Convenience timestamp for callers building a [`RequestLogRecord`].
pub fn now_timestamp_ms() -> u64 {
    now_ms()
}
