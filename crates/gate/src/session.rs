// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process browser session store.
//!
//! Each entry is keyed by the opaque session id carried in the private
//! cookie and holds the cached [`AuthSession`] plus the single-slot
//! pending-operation and pending-login markers. Entries expire a fixed
//! TTL after creation; a background sweeper evicts them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Cached token state for one authenticated browser session.
///
/// Replaced wholesale on every refresh; `account_id` and `base_path` are
/// only ever written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: String,
    /// Absolute expiry as epoch millis.
    pub token_expiration: u64,
    pub account_id: String,
    pub account_name: String,
    pub base_path: String,
}

impl AuthSession {
    /// Whether the token can be used right now given `buffer` headroom.
    /// Purely local, no I/O.
    pub fn is_usable(&self, buffer: Duration) -> bool {
        self.is_usable_at(epoch_ms(), buffer)
    }

    /// Validity check against an explicit clock.
    ///
    /// Fails when any of token, expiration, or base path is missing, or
    /// when `now + buffer` has reached the expiration.
    pub fn is_usable_at(&self, now_ms: u64, buffer: Duration) -> bool {
        if self.access_token.is_empty() || self.token_expiration == 0 || self.base_path.is_empty()
        {
            return false;
        }
        now_ms.saturating_add(buffer.as_millis() as u64) < self.token_expiration
    }

    /// Seconds until the token expires (0 if already expired).
    pub fn expires_in_secs(&self) -> u64 {
        self.token_expiration.saturating_sub(epoch_ms()) / 1000
    }
}

/// State held for one browser session.
#[derive(Debug, Default)]
struct SessionEntry {
    /// Identity established by the last completed login.
    identity: Option<String>,
    auth: Option<AuthSession>,
    /// Operation to resume after re-authentication (single slot).
    pending_operation: Option<String>,
    /// CSRF state for an in-flight authorization request (single slot).
    pending_login: Option<String>,
    created_at: u64,
}

impl SessionEntry {
    fn new() -> Self {
        Self { created_at: epoch_ms(), ..Default::default() }
    }
}

/// Shared session store.
pub struct SessionStore {
    entries: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), ttl }
    }

    fn expired(&self, entry: &SessionEntry) -> bool {
        epoch_ms() >= entry.created_at.saturating_add(self.ttl.as_millis() as u64)
    }

    /// Get or create the live entry for `sid`, recycling an expired one.
    fn live_entry<'a>(
        &self,
        entries: &'a mut HashMap<String, SessionEntry>,
        sid: &str,
    ) -> &'a mut SessionEntry {
        let entry = entries.entry(sid.to_owned()).or_insert_with(SessionEntry::new);
        if self.expired(entry) {
            *entry = SessionEntry::new();
        }
        entry
    }

    pub async fn identity(&self, sid: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(sid)?;
        if self.expired(entry) {
            return None;
        }
        entry.identity.clone()
    }

    pub async fn set_identity(&self, sid: &str, user_id: &str) {
        let mut entries = self.entries.write().await;
        self.live_entry(&mut entries, sid).identity = Some(user_id.to_owned());
    }

    pub async fn auth(&self, sid: &str) -> Option<AuthSession> {
        let entries = self.entries.read().await;
        let entry = entries.get(sid)?;
        if self.expired(entry) {
            return None;
        }
        entry.auth.clone()
    }

    pub async fn put_auth(&self, sid: &str, auth: AuthSession) {
        let mut entries = self.entries.write().await;
        self.live_entry(&mut entries, sid).auth = Some(auth);
    }

    pub async fn clear_auth(&self, sid: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(sid) {
            entry.auth = None;
        }
    }

    /// Record the operation to resume after authentication, overwriting
    /// any previous value.
    pub async fn set_pending_operation(&self, sid: &str, operation: &str) {
        let mut entries = self.entries.write().await;
        self.live_entry(&mut entries, sid).pending_operation = Some(operation.to_owned());
    }

    /// Read and clear the pending operation.
    pub async fn take_pending_operation(&self, sid: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(sid)?;
        if self.expired(entry) {
            entries.remove(sid);
            return None;
        }
        entry.pending_operation.take()
    }

    pub async fn set_pending_login(&self, sid: &str, state: &str) {
        let mut entries = self.entries.write().await;
        self.live_entry(&mut entries, sid).pending_login = Some(state.to_owned());
    }

    pub async fn take_pending_login(&self, sid: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(sid)?;
        if self.expired(entry) {
            entries.remove(sid);
            return None;
        }
        entry.pending_login.take()
    }

    /// Drop the whole session entry.
    pub async fn remove(&self, sid: &str) {
        self.entries.write().await.remove(sid);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Evict expired entries, returning how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.expired(entry));
        before - entries.len()
    }
}

/// Periodically sweep expired sessions until `shutdown` is cancelled.
pub fn spawn_sweeper(store: Arc<SessionStore>, interval: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => return,
            }
            let removed = store.sweep().await;
            if removed > 0 {
                tracing::debug!(removed, "swept expired sessions");
            }
        }
    });
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
