// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization code grant routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use crate::manager::LoginOutcome;
use crate::web::{cookies, CookieKey, GateState};

/// `GET /auth/login` — start the grant at the provider.
pub async fn login(
    State(gate): State<Arc<GateState>>,
    jar: PrivateCookieJar<CookieKey>,
) -> (PrivateCookieJar<CookieKey>, Redirect) {
    let (jar, sid) = cookies::session_id(jar, &gate.config);
    let url = gate.manager.begin_login(&sid).await;
    (jar, Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// `GET /auth/callback` — finish the grant, resume the pending
/// operation.
pub async fn callback(
    State(gate): State<Arc<GateState>>,
    jar: PrivateCookieJar<CookieKey>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (jar, sid) = cookies::session_id(jar, &gate.config);

    if let Some(ref error) = params.error {
        tracing::warn!(error = %error, "provider returned an error on callback");
        return (jar, prompt_redirect("provider-denied")).into_response();
    }
    let (Some(code), Some(callback_state)) = (params.code.as_deref(), params.state.as_deref())
    else {
        return (jar, prompt_redirect("invalid-callback")).into_response();
    };

    match gate.manager.complete_login(&sid, code, callback_state).await {
        Ok(LoginOutcome::Resume(target)) => (jar, Redirect::to(&target)).into_response(),
        Ok(LoginOutcome::Rejected(reason)) => (jar, prompt_redirect(reason)).into_response(),
        Err(e) => {
            tracing::error!(err = %e, "login completion failed");
            (jar, prompt_redirect("internal-error")).into_response()
        }
    }
}

/// `GET /auth/logout` — tear down and land on the prompt page.
pub async fn logout(
    State(gate): State<Arc<GateState>>,
    jar: PrivateCookieJar<CookieKey>,
) -> Response {
    let (jar, sid) = cookies::session_id(jar, &gate.config);
    let reason = match gate.manager.logout(&sid).await {
        Ok(()) => "logged-out",
        Err(e) => {
            tracing::error!(err = %e, "logout failed");
            "internal-error"
        }
    };
    (cookies::clear_session(jar), prompt_redirect(reason)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PromptParams {
    #[serde(default)]
    reason: Option<String>,
}

/// `GET /auth/prompt` — the must-authenticate page.
///
/// The reason parameter maps to canned text; nothing from the request
/// or the provider is ever echoed back.
pub async fn prompt(Query(params): Query<PromptParams>) -> Html<String> {
    let note = match params.reason.as_deref() {
        Some("logged-out") => "You are signed out.",
        Some("provider-denied") => "The identity provider declined the sign-in.",
        Some("state-mismatch") | Some("invalid-callback") => {
            "The sign-in attempt could not be verified. Please try again."
        }
        Some("exchange-failed") | Some("profile-unavailable") | Some("no-account") => {
            "Sign-in did not complete. Please try again."
        }
        _ => "Please sign in to continue.",
    };
    Html(format!(
        "<!doctype html>\n<html>\n<head><title>wicket sign in</title></head>\n<body>\n\
         <h1>wicket</h1>\n<p>{note}</p>\n<p><a href=\"/auth/login\">Sign in</a></p>\n\
         </body>\n</html>\n"
    ))
}

fn prompt_redirect(reason: &str) -> Redirect {
    Redirect::to(&format!("/auth/prompt?reason={reason}"))
}
