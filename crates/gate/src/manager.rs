// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: the refresh-or-redirect core.
//!
//! Every protected operation starts with [`SessionManager::ensure_token`].
//! It either hands back a ready-to-use API context, or arranges for the
//! browser to re-authenticate (recording which operation to resume) and
//! tells the caller to stop. Provider failures never propagate to the
//! protected operation; they degrade to the re-authentication path.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::account::resolve_account;
use crate::config::Config;
use crate::oauth::{generate_state, ProviderClient};
use crate::session::{epoch_ms, AuthSession, SessionStore};
use crate::userdb::{UserDb, UserRecord};

/// Outcome of the ensure-token step for a protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Token is usable; run the operation with this context.
    Proceed(ApiContext),
    /// Re-authentication required; send this redirect and stop.
    Redirect(String),
}

/// Outcome of the authorization-code callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Authentication complete; resume at this path.
    Resume(String),
    /// Login could not be completed; the browser goes to the prompt
    /// page with this reason code.
    Rejected(&'static str),
}

/// Everything a protected operation needs to call the downstream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiContext {
    pub access_token: String,
    pub base_path: String,
    pub account_id: String,
    pub account_name: String,
}

impl ApiContext {
    fn from_session(auth: &AuthSession) -> Self {
        Self {
            access_token: auth.access_token.clone(),
            base_path: auth.base_path.clone(),
            account_id: auth.account_id.clone(),
            account_name: auth.account_name.clone(),
        }
    }
}

/// Session state as reported to the browser. Never carries token values.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<SessionStore>,
    users: UserDb,
    provider: ProviderClient,
    target_account_id: Option<String>,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<SessionStore>,
        users: UserDb,
        provider: ProviderClient,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            users,
            provider,
            target_account_id: config.target_account_id.clone(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Make sure the session holds a token usable for at least `buffer`.
    ///
    /// Order of attempts: current session token, then a silent refresh
    /// from the durable store, then redirect to login with
    /// `operation_id` recorded for resumption.
    pub async fn ensure_token(
        &self,
        session_id: &str,
        buffer: Duration,
        operation_id: &str,
    ) -> anyhow::Result<EnsureOutcome> {
        let identity = self.sessions.identity(session_id).await;
        let auth = self
            .checked_session_auth(session_id, identity.as_deref())
            .await;

        if let Some(ref auth) = auth {
            if auth.is_usable(buffer) {
                return Ok(EnsureOutcome::Proceed(ApiContext::from_session(auth)));
            }
        }

        if let Some(ref user_id) = identity {
            if let Some(context) = self.try_refresh(session_id, user_id, buffer).await? {
                return Ok(EnsureOutcome::Proceed(context));
            }
        }

        self.sessions
            .set_pending_operation(session_id, operation_id)
            .await;
        Ok(EnsureOutcome::Redirect("/auth/login".to_string()))
    }

    /// Session tokens are only trusted when they belong to the request
    /// identity. A mismatched session is discarded wholesale, never
    /// merged or partially reused.
    async fn checked_session_auth(
        &self,
        session_id: &str,
        identity: Option<&str>,
    ) -> Option<AuthSession> {
        let auth = self.sessions.auth(session_id).await?;
        if identity != Some(auth.user_id.as_str()) {
            tracing::warn!(
                session_user = %auth.user_id,
                request_user = identity.unwrap_or("<none>"),
                "session identity mismatch, discarding session tokens"
            );
            self.sessions.clear_auth(session_id).await;
            return None;
        }
        Some(auth)
    }

    /// Silent refresh from the durable store. `Ok(None)` means the
    /// refresh path is unusable and the caller falls back to login.
    async fn try_refresh(
        &self,
        session_id: &str,
        user_id: &str,
        buffer: Duration,
    ) -> anyhow::Result<Option<ApiContext>> {
        let Some(row) = self.users.get(user_id).await? else {
            return Ok(None);
        };

        let token = match self.provider.refresh_grant(&row.refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id, err = %e, "token refresh failed, deleting stored credential");
                self.users.delete(user_id).await?;
                return Ok(None);
            }
        };

        // A token that will expire within the caller's buffer is as good
        // as expired already.
        if token.expires_in <= buffer.as_secs() {
            tracing::warn!(
                user_id,
                expires_in = token.expires_in,
                buffer_secs = buffer.as_secs(),
                "refreshed token lifetime below required buffer, rejecting"
            );
            self.users.delete(user_id).await?;
            return Ok(None);
        }

        let info = match self.provider.user_info(&token.access_token).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(user_id, err = %e, "userinfo fetch failed after refresh");
                return Ok(None);
            }
        };

        // The account the user last worked in stays selected across
        // refreshes.
        let Some(context) = resolve_account(&info.accounts, Some(&row.account_id)) else {
            tracing::warn!(user_id, "userinfo returned no accounts");
            return Ok(None);
        };

        let refresh_token = token.refresh_token.clone().unwrap_or(row.refresh_token);
        let auth = AuthSession {
            user_id: user_id.to_string(),
            access_token: token.access_token.clone(),
            token_expiration: epoch_ms().saturating_add(token.expires_in.saturating_mul(1000)),
            account_id: context.account_id.clone(),
            account_name: context.account_name.clone(),
            base_path: context.base_path.clone(),
        };
        self.sessions.put_auth(session_id, auth).await;
        self.users
            .put(&UserRecord {
                user_id: user_id.to_string(),
                refresh_token,
                account_id: context.account_id.clone(),
            })
            .await?;

        tracing::info!(user_id, account_id = %context.account_id, "access token refreshed");
        Ok(Some(ApiContext {
            access_token: token.access_token,
            base_path: context.base_path,
            account_id: context.account_id,
            account_name: context.account_name,
        }))
    }

    /// Start the authorization code grant: store the anti-forgery state
    /// and hand back the provider URL to redirect to.
    pub async fn begin_login(&self, session_id: &str) -> String {
        let state = generate_state();
        self.sessions.set_pending_login(session_id, &state).await;
        self.provider.authorize_url(&state)
    }

    /// Finish the authorization code grant from the callback request.
    pub async fn complete_login(
        &self,
        session_id: &str,
        code: &str,
        state: &str,
    ) -> anyhow::Result<LoginOutcome> {
        let expected = self.sessions.take_pending_login(session_id).await;
        if expected.as_deref() != Some(state) {
            tracing::warn!("login state mismatch, rejecting callback");
            return Ok(LoginOutcome::Rejected("state-mismatch"));
        }

        let token = match self.provider.exchange_code(code).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(err = %e, "authorization code exchange failed");
                return Ok(LoginOutcome::Rejected("exchange-failed"));
            }
        };

        let info = match self.provider.user_info(&token.access_token).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(err = %e, "userinfo fetch failed after login");
                return Ok(LoginOutcome::Rejected("profile-unavailable"));
            }
        };

        let Some(context) = resolve_account(&info.accounts, self.target_account_id.as_deref())
        else {
            tracing::warn!(user_id = %info.sub, "userinfo returned no accounts");
            return Ok(LoginOutcome::Rejected("no-account"));
        };

        let auth = AuthSession {
            user_id: info.sub.clone(),
            access_token: token.access_token.clone(),
            token_expiration: epoch_ms().saturating_add(token.expires_in.saturating_mul(1000)),
            account_id: context.account_id.clone(),
            account_name: context.account_name.clone(),
            base_path: context.base_path.clone(),
        };
        self.sessions.set_identity(session_id, &info.sub).await;
        self.sessions.put_auth(session_id, auth).await;

        match token.refresh_token {
            Some(refresh_token) => {
                self.users
                    .put(&UserRecord {
                        user_id: info.sub.clone(),
                        refresh_token,
                        account_id: context.account_id.clone(),
                    })
                    .await?;
            }
            None => {
                tracing::debug!(user_id = %info.sub, "provider returned no refresh token, nothing persisted");
            }
        }

        tracing::info!(user_id = %info.sub, account_id = %context.account_id, "authentication completed");

        let target = match self.sessions.take_pending_operation(session_id).await {
            Some(operation) => format!("/{operation}"),
            None => "/".to_string(),
        };
        Ok(LoginOutcome::Resume(target))
    }

    /// Tear down the session and the durable credential. Idempotent.
    pub async fn logout(&self, session_id: &str) -> anyhow::Result<()> {
        if let Some(user_id) = self.sessions.identity(session_id).await {
            self.users.delete(&user_id).await?;
            tracing::info!(user_id = %user_id, "logged out");
        }
        self.sessions.remove(session_id).await;
        Ok(())
    }

    /// Token-free view of the session for the browser.
    pub async fn session_snapshot(&self, session_id: &str) -> SessionSnapshot {
        let identity = self.sessions.identity(session_id).await;
        let auth = self.sessions.auth(session_id).await;
        match auth {
            Some(auth) => SessionSnapshot {
                authenticated: true,
                user_id: identity.or_else(|| Some(auth.user_id.clone())),
                account_id: Some(auth.account_id.clone()),
                account_name: Some(auth.account_name.clone()),
                base_path: Some(auth.base_path.clone()),
                expires_in_secs: Some(auth.expires_in_secs()),
            },
            None => SessionSnapshot {
                authenticated: false,
                user_id: identity,
                account_id: None,
                account_name: None,
                base_path: None,
                expires_in_secs: None,
            },
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
