// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level retry state machine: select → refresh → transform → send →
//! classify → rotate (spec §4.K). This is the "opaque fetch function" the
//! host agent calls once per outbound request.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::classifier;
use crate::error::GatewayError;
use crate::manager::AccountManager;
use crate::model::{Account, RateLimitReason};
use crate::sinks::{NoopSink, RequestLogRecord, RequestLogSink};
use crate::sse::{self, Converted};
use crate::transformer::{self, TransformConfig};

const MAX_RETRIES: u32 = 3;
const RETRYABLE_STATUSES: &[u16] = &[429, 404, 503, 529];

/// The final outcome handed back to the host.
pub enum GatewayResponse {
    /// A synthesized single-JSON response (non-streaming callers, SSE
    /// collapsed per §4.J), or the upstream's own JSON/text body as-is.
    Buffered { status: u16, content_type: String, body: Bytes },
    /// A live upstream byte stream (streaming callers).
    Stream { status: u16, content_type: String, body: BoxStream<'static, reqwest::Result<Bytes>> },
}

pub struct Gateway {
    manager: Arc<AccountManager>,
    http: reqwest::Client,
    transform_config: TransformConfig,
    request_log: Arc<dyn RequestLogSink>,
}

impl Gateway {
    pub fn new(manager: Arc<AccountManager>, http: reqwest::Client, transform_config: TransformConfig) -> Self {
        Self { manager, http, transform_config, request_log: Arc::new(NoopSink) }
    }

    pub fn with_request_log(mut self, sink: Arc<dyn RequestLogSink>) -> Self {
        self.request_log = sink;
        self
    }

    /// Run the request through the full retry state machine.
    pub async fn intercept(
        &self,
        cancel: CancellationToken,
        url: &str,
        original_body: Value,
    ) -> Result<GatewayResponse, GatewayError> {
        let is_stream = original_body.get("stream").and_then(Value::as_bool).unwrap_or(false);
        let body = transformer::transform(&original_body, &self.transform_config);
        let rewritten_url = rewrite_url(url);

        // S0: pick_account
        let mut account = self.manager.select_account().await.ok_or(GatewayError::NoAccounts)?;
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            // S1: ensure_token
            let ensured = loop {
                match self.manager.ensure_access_token(&account).await {
                    Some(ready) => break ready,
                    None => {
                        if attempt >= MAX_RETRIES {
                            return Err(GatewayError::NoAccounts);
                        }
                        attempt += 1;
                        account = self.manager.select_account().await.ok_or(GatewayError::NoAccounts)?;
                    }
                }
            };
            account = ensured;

            // S2: send
            let headers = compose_headers(&account.account, &body);
            let send = self.http.post(&rewritten_url).headers(headers).json(&body).send();

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                result = send => result,
            };

            let response = match response {
                Ok(r) => r,
                Err(_) if cancel.is_cancelled() => return Err(GatewayError::Cancelled),
                Err(_) => {
                    self.manager.record_failure(account.index).await;
                    if attempt < MAX_RETRIES {
                        attempt += 1;
                        match self.manager.select_account().await {
                            Some(next) => {
                                account = next;
                                continue;
                            }
                            None => return Err(GatewayError::NoAccounts),
                        }
                    }
                    return Err(GatewayError::Internal);
                }
            };

            // S3: dispatch
            let status = response.status().as_u16();

            if response.status().is_success() {
                self.manager.record_success(account.index).await;
                self.log_request(&account.account, &body, "success");
                return self.finish(response, is_stream).await;
            }

            if RETRYABLE_STATUSES.contains(&status) {
                let text = read_body_for_classification(response).await;
                let reason = classifier::classify(status, &text);
                if status == 404 && reason == RateLimitReason::Unknown {
                    // A real 404: surface it unchanged, no rotation.
                    return Ok(GatewayResponse::Buffered {
                        status,
                        content_type: "application/json; charset=utf-8".to_string(),
                        body: Bytes::from(text),
                    });
                }

                self.manager.mark_rate_limited(account.index, reason).await;
                self.log_request(&account.account, &body, reason.label());

                if attempt < MAX_RETRIES {
                    if let Some(next) = self.manager.select_account().await {
                        attempt += 1;
                        account = next;
                        continue;
                    }
                }

                let remapped = classifier::remap_status(status, reason);
                return Ok(GatewayResponse::Buffered {
                    status: remapped,
                    content_type: "application/json; charset=utf-8".to_string(),
                    body: Bytes::from(text),
                });
            }

            if status == 401 {
                self.manager.record_failure(account.index).await;
                if attempt < MAX_RETRIES {
                    if let Some(next) = self.manager.select_account().await {
                        attempt += 1;
                        account = next;
                        continue;
                    }
                }
                let text = read_body_for_classification(response).await;
                return Ok(GatewayResponse::Buffered {
                    status,
                    content_type: "application/json; charset=utf-8".to_string(),
                    body: Bytes::from(text),
                });
            }

            // Any other non-OK status: surfaced unchanged after one attempt (§7 UPSTREAM_OTHER).
            return self.finish(response, is_stream).await;
        }
    }

    async fn finish(&self, response: reqwest::Response, is_stream: bool) -> Result<GatewayResponse, GatewayError> {
        let status = response.status().as_u16();
        let upstream_content_type =
            response.headers().get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);

        if is_stream {
            let content_type = sse::ensure_event_stream_content_type(upstream_content_type.as_deref());
            let body = response.bytes_stream().boxed();
            return Ok(GatewayResponse::Stream { status, content_type, body });
        }

        let text = response.text().await.map_err(|_| GatewayError::Internal)?;
        let Converted { status, content_type, body } = sse::convert_to_json(&text, status);
        Ok(GatewayResponse::Buffered { status, content_type: content_type.to_string(), body: Bytes::from(body) })
    }

    fn log_request(&self, account: &Account, transformed_body: &Value, outcome: &str) {
        self.request_log.log_request(RequestLogRecord {
            timestamp_ms: crate::sinks::now_timestamp_ms(),
            account_id: account.account_id.clone(),
            transformed_body: transformed_body.clone(),
            outcome: outcome.to_string(),
        });
    }
}

impl RateLimitReason {
    fn label(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::UsageLimitReached => "usage_limit_reached",
            Self::ServerError => "server_error",
            Self::Unknown => "unknown",
        }
    }
}

async fn read_body_for_classification(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

/// Replace the trailing `/responses` path segment with `/codex/responses`.
/// No other part of the URL is touched.
fn rewrite_url(url: &str) -> String {
    match url.strip_suffix("/responses") {
        Some(prefix) => format!("{prefix}/codex/responses"),
        None => url.to_string(),
    }
}

fn compose_headers(account: &Account, body: &Value) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(access) = &account.access_token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {access}")) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
    }

    if let Some(account_id) = &account.account_id {
        if let Ok(value) = HeaderValue::from_str(account_id) {
            headers.insert(HeaderName::from_static("chatgpt-account-id"), value);
        }
    }

    headers.insert(HeaderName::from_static("openai-beta"), HeaderValue::from_static("responses=experimental"));
    headers.insert(HeaderName::from_static("originator"), HeaderValue::from_static("codex_cli_rs"));
    headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("text/event-stream"));

    if let Some(cache_key) = body.get("prompt_cache_key").and_then(Value::as_str) {
        if let Ok(value) = HeaderValue::from_str(cache_key) {
            headers.insert(HeaderName::from_static("conversation_id"), value.clone());
            headers.insert(HeaderName::from_static("session_id"), value);
        }
    }

    headers.remove(HeaderName::from_static("x-api-key"));

    headers
}

#[cfg(test)]
#[path = "interceptor_tests.rs"]
mod tests;
