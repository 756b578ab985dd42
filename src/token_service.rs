// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth token exchange, refresh, and identity-claim decoding (spec §4.A).
//!
//! Never retries; callers that want a retry policy wrap these calls
//! themselves (see [`crate::manager::AccountManager::ensure_access_token`]).

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::now_ms;

/// Standard OAuth2 token response fields this service depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// Tokens freshly exchanged or refreshed, with an absolute expiry.
#[derive(Debug, Clone)]
pub struct ExchangedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute millisecond timestamp.
    pub access_token_expiry: u64,
}

/// Identity claims decoded out of an access token, best-effort.
#[derive(Debug, Clone, Default)]
pub struct IdentityClaims {
    pub account_id: Option<String>,
    pub email: Option<String>,
}

/// Where to find the account-id and profile claims in the decoded payload.
#[derive(Debug, Clone)]
pub struct ClaimPaths {
    pub auth_namespace: &'static str,
    pub account_id_key: &'static str,
    pub profile_namespace: &'static str,
    pub email_key: &'static str,
}

impl Default for ClaimPaths {
    fn default() -> Self {
        Self {
            auth_namespace: "https://api.openai.com/auth",
            account_id_key: "chatgpt_account_id",
            profile_namespace: "https://api.openai.com/profile",
            email_key: "email",
        }
    }
}

/// Vendor token-endpoint client. Form-encoded POST, JSON response (spec §4.A).
pub struct TokenService {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    claims: ClaimPaths,
}

impl TokenService {
    pub fn new(http: reqwest::Client, token_url: String, client_id: String) -> Self {
        Self { http, token_url, client_id, claims: ClaimPaths::default() }
    }

    /// Decode identity claims from an access token's middle (payload) segment.
    ///
    /// Any parse failure at any step yields empty claims rather than an error
    /// (spec §4.A: "On any parse failure return 'no claims'").
    pub fn decode_identity_claims(&self, access_token: &str) -> IdentityClaims {
        decode_claims(access_token, &self.claims)
    }

    /// Exchange an authorization code for tokens (PKCE flow completion).
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> anyhow::Result<ExchangedTokens> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("code", code),
                ("code_verifier", code_verifier),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("authorization code exchange failed ({status}): {text}");
        }

        let token: TokenResponse = resp.json().await?;
        to_exchanged(token)
    }

    /// Refresh an access token. Never retries; the caller decides (spec §4.A).
    pub async fn refresh(&self, refresh_token: &str) -> anyhow::Result<ExchangedTokens> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("refresh failed ({status}): {text}");
        }

        let token: TokenResponse = resp.json().await?;
        to_exchanged(token)
    }
}

fn to_exchanged(token: TokenResponse) -> anyhow::Result<ExchangedTokens> {
    let refresh_token = token
        .refresh_token
        .ok_or_else(|| anyhow::anyhow!("token response missing refresh_token"))?;
    Ok(ExchangedTokens {
        access_token: token.access_token,
        refresh_token,
        access_token_expiry: now_ms() + token.expires_in.saturating_mul(1000),
    })
}

fn decode_claims(access_token: &str, paths: &ClaimPaths) -> IdentityClaims {
    let Some(payload) = access_token.split('.').nth(1) else {
        return IdentityClaims::default();
    };
    let Ok(bytes) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload) else {
        // Some issuers pad the segment; retry with the standard engine as a fallback.
        return decode_claims_padded(payload, paths);
    };
    let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
        return IdentityClaims::default();
    };
    claims_from_value(&value, paths)
}

fn decode_claims_padded(payload: &str, paths: &ClaimPaths) -> IdentityClaims {
    let Ok(bytes) = base64::engine::general_purpose::STANDARD_NO_PAD.decode(payload) else {
        return IdentityClaims::default();
    };
    let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
        return IdentityClaims::default();
    };
    claims_from_value(&value, paths)
}

fn claims_from_value(value: &Value, paths: &ClaimPaths) -> IdentityClaims {
    let account_id = value
        .get(paths.auth_namespace)
        .and_then(|ns| ns.get(paths.account_id_key))
        .and_then(Value::as_str)
        .map(str::to_owned);

    let email = value
        .get(paths.profile_namespace)
        .and_then(|ns| ns.get(paths.email_key))
        .and_then(Value::as_str)
        .or_else(|| value.get("email").and_then(Value::as_str))
        .map(str::to_owned);

    IdentityClaims { account_id, email }
}

#[cfg(test)]
#[path = "token_service_tests.rs"]
mod tests;
