// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a stub identity provider and assertion helpers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::oauth::{ProviderAccount, TokenResponse, UserInfo};

/// How the stub token endpoint should reject a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFailure {
    /// 400 with an `invalid_grant` error body.
    InvalidGrant,
    /// 500 with a non-JSON body.
    ServerError,
}

struct StubState {
    expected_client: Option<(String, String)>,
    sub: String,
    accounts: RwLock<Vec<ProviderAccount>>,
    expires_in: AtomicU64,
    refresh_failure: RwLock<Option<TokenFailure>>,
    exchange_failure: RwLock<Option<TokenFailure>>,
    userinfo_failure: RwLock<bool>,
    omit_refresh_token: AtomicBool,
    issued: AtomicU32,
    auth_calls: AtomicU32,
    refresh_calls: AtomicU32,
    exchange_calls: AtomicU32,
    userinfo_calls: AtomicU32,
    last_refresh_token: RwLock<Option<String>>,
    last_code: RwLock<Option<String>>,
}

/// Builder for a [`StubProvider`] with sensible defaults.
pub struct ProviderBuilder {
    sub: String,
    accounts: Vec<ProviderAccount>,
    expires_in: u64,
    expected_client: Option<(String, String)>,
}

impl Default for ProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderBuilder {
    pub fn new() -> Self {
        Self {
            sub: "user-1".into(),
            accounts: vec![account("acct-default", "Default", true)],
            expires_in: 3600,
            expected_client: None,
        }
    }

    pub fn sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = sub.into();
        self
    }

    pub fn accounts(mut self, accounts: Vec<ProviderAccount>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn expires_in(mut self, secs: u64) -> Self {
        self.expires_in = secs;
        self
    }

    /// Reject token requests whose basic auth does not match.
    pub fn expect_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.expected_client = Some((id.into(), secret.into()));
        self
    }

    /// Bind on a loopback port and start serving.
    pub async fn spawn(self) -> anyhow::Result<StubProvider> {
        let state = Arc::new(StubState {
            expected_client: self.expected_client,
            sub: self.sub,
            accounts: RwLock::new(self.accounts),
            expires_in: AtomicU64::new(self.expires_in),
            refresh_failure: RwLock::new(None),
            exchange_failure: RwLock::new(None),
            userinfo_failure: RwLock::new(false),
            omit_refresh_token: AtomicBool::new(false),
            issued: AtomicU32::new(0),
            auth_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            exchange_calls: AtomicU32::new(0),
            userinfo_calls: AtomicU32::new(0),
            last_refresh_token: RwLock::new(None),
            last_code: RwLock::new(None),
        });

        let router = Router::new()
            .route("/oauth/auth", get(handle_auth))
            .route("/oauth/token", post(handle_token))
            .route("/oauth/userinfo", get(handle_userinfo))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await;
        });

        Ok(StubProvider {
            state,
            addr,
            shutdown,
        })
    }
}

/// In-process identity provider for tests.
///
/// Serves the three provider endpoints on a random loopback port and
/// counts every call, so tests can assert that a usable token produced
/// zero provider traffic.
pub struct StubProvider {
    state: Arc<StubState>,
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl StubProvider {
    pub async fn spawn() -> anyhow::Result<Self> {
        ProviderBuilder::new().spawn().await
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn auth_calls(&self) -> u32 {
        self.state.auth_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> u32 {
        self.state.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn userinfo_calls(&self) -> u32 {
        self.state.userinfo_calls.load(Ordering::SeqCst)
    }

    /// Total calls across every endpoint.
    pub fn total_calls(&self) -> u32 {
        self.auth_calls() + self.refresh_calls() + self.exchange_calls() + self.userinfo_calls()
    }

    pub fn set_expires_in(&self, secs: u64) {
        self.state.expires_in.store(secs, Ordering::SeqCst);
    }

    pub async fn set_refresh_failure(&self, failure: Option<TokenFailure>) {
        *self.state.refresh_failure.write().await = failure;
    }

    pub async fn set_exchange_failure(&self, failure: Option<TokenFailure>) {
        *self.state.exchange_failure.write().await = failure;
    }

    pub async fn set_userinfo_failure(&self, fail: bool) {
        *self.state.userinfo_failure.write().await = fail;
    }

    /// Leave `refresh_token` out of token responses.
    pub fn set_omit_refresh_token(&self, omit: bool) {
        self.state.omit_refresh_token.store(omit, Ordering::SeqCst);
    }

    pub async fn set_accounts(&self, accounts: Vec<ProviderAccount>) {
        *self.state.accounts.write().await = accounts;
    }

    /// Refresh token presented in the most recent refresh grant.
    pub async fn last_refresh_token(&self) -> Option<String> {
        self.state.last_refresh_token.read().await.clone()
    }

    /// Authorization code presented in the most recent exchange.
    pub async fn last_code(&self) -> Option<String> {
        self.state.last_code.read().await.clone()
    }
}

impl Drop for StubProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Provider account entry with a base URI derived from the id.
pub fn account(id: &str, name: &str, is_default: bool) -> ProviderAccount {
    ProviderAccount {
        account_id: id.into(),
        account_name: name.into(),
        base_uri: format!("https://{id}.api.example.com"),
        is_default,
    }
}

async fn handle_auth(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.auth_calls.fetch_add(1, Ordering::SeqCst);
    let redirect_uri = params.get("redirect_uri").cloned().unwrap_or_default();
    let req_state = params.get("state").cloned().unwrap_or_default();
    let code = format!("code-{}", state.issued.fetch_add(1, Ordering::SeqCst) + 1);
    Redirect::to(&format!("{redirect_uri}?code={code}&state={req_state}")).into_response()
}

async fn handle_token(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Some((ref id, ref secret)) = state.expected_client {
        if !basic_auth_matches(&headers, id, secret) {
            return (StatusCode::UNAUTHORIZED, "bad client credentials").into_response();
        }
    }

    let grant_type = form.get("grant_type").map(String::as_str).unwrap_or("");
    let failure = match grant_type {
        "refresh_token" => {
            state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            *state.last_refresh_token.write().await = form.get("refresh_token").cloned();
            *state.refresh_failure.read().await
        }
        "authorization_code" => {
            state.exchange_calls.fetch_add(1, Ordering::SeqCst);
            *state.last_code.write().await = form.get("code").cloned();
            *state.exchange_failure.read().await
        }
        _ => return grant_error(StatusCode::BAD_REQUEST, "unsupported_grant_type"),
    };

    match failure {
        Some(TokenFailure::InvalidGrant) => grant_error(StatusCode::BAD_REQUEST, "invalid_grant"),
        Some(TokenFailure::ServerError) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "stub provider exploded").into_response()
        }
        None => {
            let n = state.issued.fetch_add(1, Ordering::SeqCst) + 1;
            let refresh_token = if state.omit_refresh_token.load(Ordering::SeqCst) {
                None
            } else {
                Some(format!("rt-{n}"))
            };
            Json(TokenResponse {
                access_token: format!("at-{n}"),
                refresh_token,
                expires_in: state.expires_in.load(Ordering::SeqCst),
                token_type: Some("Bearer".into()),
            })
            .into_response()
        }
    }
}

async fn handle_userinfo(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.userinfo_calls.fetch_add(1, Ordering::SeqCst);
    if *state.userinfo_failure.read().await {
        return (StatusCode::INTERNAL_SERVER_ERROR, "stub provider exploded").into_response();
    }

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Bearer "))
        .unwrap_or(false);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
    }

    Json(UserInfo {
        sub: state.sub.clone(),
        name: Some("Stub User".into()),
        email: Some("stub@example.com".into()),
        accounts: state.accounts.read().await.clone(),
    })
    .into_response()
}

fn grant_error(status: StatusCode, code: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": code,
            "error_description": "stub provider rejection",
        })),
    )
        .into_response()
}

fn basic_auth_matches(headers: &HeaderMap, client_id: &str, client_secret: &str) -> bool {
    let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded) else {
        return false;
    };
    String::from_utf8(decoded)
        .map(|creds| creds == format!("{client_id}:{client_secret}"))
        .unwrap_or(false)
}

/// Extension trait to convert any `Display` error into `anyhow::Error`.
/// Replaces `.map_err(|e| anyhow::anyhow!("{e}"))` with `.anyhow()`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
