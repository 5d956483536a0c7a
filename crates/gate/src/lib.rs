// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wicket: OAuth session gate for provider-backed web apps.

pub mod account;
pub mod config;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod session;
pub mod test_support;
pub mod userdb;
pub mod web;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::manager::SessionManager;
use crate::oauth::ProviderClient;
use crate::session::{spawn_sweeper, SessionStore};
use crate::userdb::UserDb;
use crate::web::{build_router, GateState};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the gate server until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // Install the rustls crypto provider (needed for reqwest even on
    // plain HTTP).
    let _ = rustls::crypto::ring::default_provider().install_default();

    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let db_path = config.db_path();
    let users = UserDb::open(&db_path).await?;
    info!(path = %db_path.display(), "opened user store");

    let sessions = Arc::new(SessionStore::new(config.session_ttl()));
    spawn_sweeper(Arc::clone(&sessions), SESSION_SWEEP_INTERVAL, shutdown.clone());

    let provider = ProviderClient::new(&config);
    let manager = SessionManager::new(Arc::clone(&sessions), users, provider, &config);
    let state = Arc::new(GateState::new(manager, config));

    // Spawn signal handler
    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGTERM");
                    sd.cancel();
                }
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGINT");
                    sd.cancel();
                }
            }
        });
    }

    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    info!("wicket listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
