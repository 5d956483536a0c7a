// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity provider client: authorization URL, token grants, userinfo.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::Rng as _;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Standard OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Error body returned by the token endpoint on a rejected grant.
#[derive(Debug, Clone, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// One account membership reported by the userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAccount {
    pub account_id: String,
    pub account_name: String,
    pub base_uri: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Claims for the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub accounts: Vec<ProviderAccount>,
}

/// Provider-side failure, split by whether the grant itself is dead.
#[derive(Debug)]
pub enum ProviderError {
    /// The provider rejected the grant (revoked or expired refresh token,
    /// replayed authorization code). Retrying the same grant cannot help.
    InvalidGrant(String),
    /// Network failure, timeout, or a malformed provider response.
    Transient(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::InvalidGrant(msg) => write!(f, "invalid_grant: {msg}"),
            ProviderError::Transient(msg) => write!(f, "transient: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// HTTP client for the identity provider's OAuth endpoints.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl ProviderClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base: config.oauth_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri(),
        }
    }

    /// Provider page that starts the authorization code grant.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/oauth/auth?{}",
            self.base,
            urlencoded(&[
                ("response_type", "code"),
                ("scope", "signature"),
                ("client_id", &self.client_id),
                ("redirect_uri", &self.redirect_uri),
                ("state", state),
            ])
        )
    }

    /// Trade a refresh token for a fresh token pair.
    pub async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Trade an authorization code for the initial token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ProviderError> {
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    async fn token_grant(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ProviderError> {
        let resp = self
            .http
            .post(format!("{}/oauth/token", self.base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("token endpoint: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("token endpoint body: {e}")))?;

        if !status.is_success() {
            return Err(classify_grant_rejection(status.as_u16(), &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Transient(format!("malformed token response: {e}")))
    }

    /// Fetch the authenticated user's claims and account memberships.
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError> {
        let resp = self
            .http
            .get(format!("{}/oauth/userinfo", self.base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("userinfo endpoint: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("userinfo body: {e}")))?;

        if !status.is_success() {
            return Err(ProviderError::Transient(format!(
                "userinfo failed ({status}): {body}"
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Transient(format!("malformed userinfo response: {e}")))
    }
}

/// Decide whether a token endpoint rejection means the grant is dead.
///
/// Only an explicit `invalid_grant` error code counts; every other
/// rejection, including unparseable bodies, reads as transient.
fn classify_grant_rejection(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(TokenErrorBody {
            error,
            error_description,
        }) if error == "invalid_grant" => {
            ProviderError::InvalidGrant(error_description.unwrap_or(error))
        }
        _ => ProviderError::Transient(format!("token grant failed ({status}): {body}")),
    }
}

/// Random URL-safe state parameter for CSRF protection.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build a URL-encoded query string.
fn urlencoded(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding(k), urlencoding(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn urlencoding(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            _ => format!("%{:02X}", c as u8),
        })
        .collect()
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
