// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accumulate an event stream into a single final JSON response, for callers
//! that asked for a non-streaming result (spec §4.J).

use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Outcome of converting a buffered SSE body for a non-streaming caller.
pub struct Converted {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

/// Convert a complete SSE body. Only call this for non-streaming callers;
/// streaming callers get the body unchanged (see [`ensure_event_stream_content_type`]).
pub fn convert_to_json(raw_body: &str, original_status: u16) -> Converted {
    for line in raw_body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(payload) = line.strip_prefix("data: ") else { continue };
        let Ok(event) = serde_json::from_str::<Value>(payload) else { continue };
        let event_type = event.get("type").and_then(Value::as_str);
        if matches!(event_type, Some("response.done") | Some("response.completed")) {
            if let Some(response) = event.get("response") {
                let body = serde_json::to_string(response).unwrap_or_default();
                return Converted { status: original_status, content_type: JSON_CONTENT_TYPE, body };
            }
        }
    }

    Converted { status: original_status, content_type: JSON_CONTENT_TYPE, body: raw_body.to_string() }
}

/// For streaming callers: the body passes through unchanged, but the
/// Content-Type is filled in if the upstream omitted it.
pub fn ensure_event_stream_content_type(existing: Option<&str>) -> String {
    existing.unwrap_or(EVENT_STREAM_CONTENT_TYPE).to_string()
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
