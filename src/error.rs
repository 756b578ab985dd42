// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error kinds raised at the public seam of the gateway (spec §7).
///
/// Most upstream failure modes (rate limits, server errors, auth failures)
/// are never raised as errors here — they are response statuses that feed
/// the retry loop in [`crate::interceptor`] and are surfaced as the final
/// HTTP response once the retry budget is exhausted. Only conditions that
/// leave the interceptor with no request to send become a `GatewayError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayError {
    /// The account pool is empty, or every account is disabled/exhausted.
    NoAccounts,
    /// A request body could not be parsed as the expected JSON shape.
    BadRequest,
    /// The host cancelled the request before a response was produced.
    /// Not one of spec §7's error kinds (cancellation is "no observation",
    /// not a failure) but the caller still needs a return path.
    Cancelled,
    /// Internal invariant violation.
    Internal,
}

impl GatewayError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoAccounts => 503,
            Self::BadRequest => 400,
            Self::Cancelled => 499,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAccounts => "NO_ACCOUNTS",
            Self::BadRequest => "BAD_REQUEST",
            Self::Cancelled => "CANCELLED",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for GatewayError {}

/// Top-level error response envelope, used when the gateway must synthesize
/// a response rather than forward an upstream one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with a machine-readable code and a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
