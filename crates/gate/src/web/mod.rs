// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Web surface: session cookie, auth flow, protected demos, ops routes.

pub mod auth;
pub mod cookies;
pub mod http;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::Key;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::manager::SessionManager;

/// Shared state for all wicket handlers.
pub struct GateState {
    pub manager: SessionManager,
    pub config: Config,
    cookie_key: Key,
}

impl GateState {
    /// Derives the private-cookie key from the configured session
    /// secret; `Config::validate` has already checked its length.
    pub fn new(manager: SessionManager, config: Config) -> Self {
        let cookie_key = Key::derive_from(config.session_secret.as_bytes());
        Self {
            manager,
            config,
            cookie_key,
        }
    }
}

/// Key newtype for the private cookie jar: the orphan rule forbids
/// `impl FromRef<Arc<GateState>> for Key` on the foreign `Key` itself,
/// and `PrivateCookieJar<K>` only needs `K: FromRef<S> + Into<Key>`.
#[derive(Clone)]
pub struct CookieKey(Key);

impl FromRef<Arc<GateState>> for CookieKey {
    fn from_ref(state: &Arc<GateState>) -> Self {
        Self(state.cookie_key.clone())
    }
}

impl From<CookieKey> for Key {
    fn from(key: CookieKey) -> Self {
        key.0
    }
}

/// Build the axum `Router` with all wicket routes.
pub fn build_router(state: Arc<GateState>) -> Router {
    Router::new()
        // Landing + ops (no auth)
        .route("/", get(http::landing))
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/session", get(http::session))
        // Authorization code grant flow
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .route("/auth/prompt", get(auth::prompt))
        // Protected demo operations
        .route("/eg/{id}", get(http::example_form).post(http::example_submit))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
