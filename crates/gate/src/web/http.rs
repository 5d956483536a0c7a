// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operational and protected demo handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::PrivateCookieJar;
use serde::Serialize;

use crate::error::GateError;
use crate::manager::{ApiContext, EnsureOutcome};
use crate::web::{cookies, CookieKey, GateState};

/// Embedded landing page HTML.
const LANDING_HTML: &str = include_str!("pages/landing.html");

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub session_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExampleResponse {
    pub operation: String,
    pub account_id: String,
    pub account_name: String,
    pub base_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, String>>,
}

impl ExampleResponse {
    fn new(operation: String, context: ApiContext, fields: Option<HashMap<String, String>>) -> Self {
        Self {
            operation,
            account_id: context.account_id,
            account_name: context.account_name,
            base_path: context.base_path,
            fields,
        }
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(gate): State<Arc<GateState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        session_count: gate.manager.sessions().len().await,
    })
}

/// `GET /api/v1/session` — token-free session snapshot.
pub async fn session(
    State(gate): State<Arc<GateState>>,
    jar: PrivateCookieJar<CookieKey>,
) -> Response {
    let (jar, sid) = cookies::session_id(jar, &gate.config);
    let snapshot = gate.manager.session_snapshot(&sid).await;
    (jar, Json(snapshot)).into_response()
}

/// `GET /`
pub async fn landing() -> Html<&'static str> {
    Html(LANDING_HTML)
}

/// `GET /eg/{id}` — protected form page. Checked with the form buffer
/// so the follow-up submit still holds a live token.
pub async fn example_form(
    State(gate): State<Arc<GateState>>,
    jar: PrivateCookieJar<CookieKey>,
    Path(id): Path<String>,
) -> Response {
    let Some(operation) = operation_id(&id) else {
        return GateError::BadRequest
            .to_http_response("bad operation id")
            .into_response();
    };
    let (jar, sid) = cookies::session_id(jar, &gate.config);

    match gate
        .manager
        .ensure_token(&sid, gate.config.form_buffer(), &operation)
        .await
    {
        Ok(EnsureOutcome::Proceed(context)) => {
            (jar, Json(ExampleResponse::new(operation, context, None))).into_response()
        }
        Ok(EnsureOutcome::Redirect(to)) => (jar, Redirect::to(&to)).into_response(),
        Err(e) => {
            tracing::error!(err = %e, "token check failed");
            (
                jar,
                GateError::StoreError.to_http_response(format!("token check failed: {e}")),
            )
                .into_response()
        }
    }
}

/// `POST /eg/{id}` — protected submit; echoes the form fields with the
/// account context.
pub async fn example_submit(
    State(gate): State<Arc<GateState>>,
    jar: PrivateCookieJar<CookieKey>,
    Path(id): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let Some(operation) = operation_id(&id) else {
        return GateError::BadRequest
            .to_http_response("bad operation id")
            .into_response();
    };
    let (jar, sid) = cookies::session_id(jar, &gate.config);

    match gate
        .manager
        .ensure_token(&sid, gate.config.submit_buffer(), &operation)
        .await
    {
        Ok(EnsureOutcome::Proceed(context)) => (
            jar,
            Json(ExampleResponse::new(operation, context, Some(fields))),
        )
            .into_response(),
        Ok(EnsureOutcome::Redirect(to)) => (jar, Redirect::to(&to)).into_response(),
        Err(e) => {
            tracing::error!(err = %e, "token check failed");
            (
                jar,
                GateError::StoreError.to_http_response(format!("token check failed: {e}")),
            )
                .into_response()
        }
    }
}

/// Operation ids become resume redirect targets, so only ids that are
/// safe to embed in a path are accepted.
fn operation_id(id: &str) -> Option<String> {
    let valid =
        !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| format!("eg/{id}"))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
