// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `wicket` binary as a subprocess pointed at an
//! in-process stub identity provider, then drives it with a
//! cookie-carrying HTTP client the way a browser would.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

/// Client credentials every spawned gate is configured with.
pub const CLIENT_ID: &str = "stub-client";
pub const CLIENT_SECRET: &str = "stub-secret";

const SESSION_SECRET: &str = "spec-harness-session-secret-0123456789";

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `wicket` binary.
pub fn wicket_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("wicket")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Browser-like client: keeps cookies, follows redirects.
pub fn browser() -> anyhow::Result<reqwest::Client> {
    ensure_crypto();
    Ok(reqwest::Client::builder().cookie_store(true).build()?)
}

/// Client that keeps cookies but stops at the first redirect, for
/// asserting on 303 targets.
pub fn browser_no_redirect() -> anyhow::Result<reqwest::Client> {
    ensure_crypto();
    Ok(reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// A running `wicket` process that is killed on drop.
pub struct WicketProcess {
    child: Child,
    port: u16,
    _state_dir: Option<tempfile::TempDir>,
}

/// Builder for configuring a [`WicketProcess`].
///
/// By default each process gets a throwaway state directory.
#[derive(Default)]
pub struct WicketBuilder {
    target_account: Option<String>,
    state_dir: Option<PathBuf>,
}

impl WicketBuilder {
    /// Pass `--target-account-id` to the gate.
    pub fn target_account(mut self, id: &str) -> Self {
        self.target_account = Some(id.to_owned());
        self
    }

    /// Use an existing state directory instead of a throwaway one, so
    /// a later process can reuse the same durable store.
    pub fn state_dir(mut self, dir: &Path) -> Self {
        self.state_dir = Some(dir.to_owned());
        self
    }

    /// Spawn wicket pointed at `oauth_base`.
    pub fn spawn(self, oauth_base: &str) -> anyhow::Result<WicketProcess> {
        ensure_crypto();
        let binary = wicket_binary();
        anyhow::ensure!(binary.exists(), "wicket binary not found at {}", binary.display());

        let port = free_port()?;
        let (state_path, state_tmp) = match self.state_dir {
            Some(dir) => (dir, None),
            None => {
                let tmp = tempfile::tempdir()?;
                (tmp.path().to_owned(), Some(tmp))
            }
        };

        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--oauth-base".into(),
            oauth_base.to_owned(),
            "--client-id".into(),
            CLIENT_ID.into(),
            "--client-secret".into(),
            CLIENT_SECRET.into(),
            "--session-secret".into(),
            SESSION_SECRET.into(),
            "--app-url".into(),
            format!("http://127.0.0.1:{port}"),
            "--state-dir".into(),
            state_path.to_string_lossy().into_owned(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];
        if let Some(ref id) = self.target_account {
            args.extend(["--target-account-id".into(), id.clone()]);
        }

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(WicketProcess { child, port, _state_dir: state_tmp })
    }
}

impl WicketProcess {
    /// Create a builder for custom configuration.
    pub fn build() -> WicketBuilder {
        WicketBuilder::default()
    }

    /// Spawn wicket with the default configuration.
    pub fn start(oauth_base: &str) -> anyhow::Result<Self> {
        Self::build().spawn(oauth_base)
    }

    /// The HTTP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("wicket did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for WicketProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
