// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the wicket gate server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "wicket", about = "OAuth session gate", version)]
pub struct Config {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "WICKET_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 7080, env = "WICKET_PORT")]
    pub port: u16,

    /// Identity provider origin, e.g. https://account-d.example.com.
    #[arg(long, env = "WICKET_OAUTH_BASE")]
    pub oauth_base: String,

    /// OAuth client id (integration key).
    #[arg(long, env = "WICKET_CLIENT_ID")]
    pub client_id: String,

    /// OAuth client secret.
    #[arg(long, env = "WICKET_CLIENT_SECRET")]
    pub client_secret: String,

    /// Externally visible URL of this server (for the OAuth redirect URI).
    #[arg(long, default_value = "http://localhost:7080", env = "WICKET_APP_URL")]
    pub app_url: String,

    /// Preferred provider account id. Falls back to the default account
    /// when the authenticated identity has no such account.
    #[arg(long, env = "WICKET_TARGET_ACCOUNT_ID")]
    pub target_account_id: Option<String>,

    /// Directory for durable state (users database). Defaults to the
    /// XDG state directory.
    #[arg(long, env = "WICKET_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Secret used to encrypt session cookies (at least 32 bytes).
    #[arg(long, env = "WICKET_SESSION_SECRET")]
    pub session_secret: String,

    /// Browser session lifetime in seconds.
    #[arg(long, default_value_t = 10800, env = "WICKET_SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,

    /// Default token expiration buffer in seconds.
    #[arg(long, default_value_t = 600, env = "WICKET_TOKEN_BUFFER_SECS")]
    pub token_buffer_secs: u64,

    /// Token buffer for form (GET) pages, sized so the follow-up submit
    /// still holds a live token.
    #[arg(long, default_value_t = 3600, env = "WICKET_FORM_BUFFER_SECS")]
    pub form_buffer_secs: u64,

    /// Token buffer for submit (POST) requests.
    #[arg(long, default_value_t = 180, env = "WICKET_SUBMIT_BUFFER_SECS")]
    pub submit_buffer_secs: u64,

    /// Log format (json or text).
    #[arg(long, env = "WICKET_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WICKET_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.oauth_base.is_empty() || !self.oauth_base.starts_with("http") {
            anyhow::bail!("--oauth-base must be an http(s) origin");
        }
        if self.client_id.is_empty() {
            anyhow::bail!("--client-id must not be empty");
        }
        if self.client_secret.is_empty() {
            anyhow::bail!("--client-secret must not be empty");
        }
        if self.session_secret.len() < 32 {
            anyhow::bail!("--session-secret must be at least 32 bytes");
        }
        if self.session_ttl_secs == 0 {
            anyhow::bail!("--session-ttl-secs must be positive");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("unknown log format: {other}"),
        }
        Ok(())
    }

    /// Resolve the durable state directory.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("wicket");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/wicket");
        }
        PathBuf::from(".wicket")
    }

    /// Path to the users database file.
    pub fn db_path(&self) -> PathBuf {
        self.state_dir().join("users.db")
    }

    /// OAuth redirect URI registered with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.app_url.trim_end_matches('/'))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn token_buffer(&self) -> Duration {
        Duration::from_secs(self.token_buffer_secs)
    }

    pub fn form_buffer(&self) -> Duration {
        Duration::from_secs(self.form_buffer_secs)
    }

    pub fn submit_buffer(&self) -> Duration {
        Duration::from_secs(self.submit_buffer_secs)
    }

    /// Config for unit tests: loopback bind, throwaway secrets, tight TTLs.
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            oauth_base: "http://127.0.0.1:1".into(),
            client_id: "test-client".into(),
            client_secret: "test-secret".into(),
            app_url: "http://127.0.0.1:7080".into(),
            target_account_id: None,
            state_dir: Some(std::env::temp_dir().join(format!("wicket-test-{}", std::process::id()))),
            session_secret: "0123456789abcdef0123456789abcdef".into(),
            session_ttl_secs: 10800,
            token_buffer_secs: 600,
            form_buffer_secs: 3600,
            submit_buffer_secs: 180,
            log_format: "text".into(),
            log_level: "warn".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
