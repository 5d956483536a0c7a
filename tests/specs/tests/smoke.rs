// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `wicket` binary against
//! the stub identity provider and drive it like a browser: cookies
//! held, redirects followed.

use std::time::Duration;

use wicket::test_support::{account, ProviderBuilder, StubProvider, TokenFailure};
use wicket_specs::{browser, browser_no_redirect, WicketProcess, CLIENT_ID, CLIENT_SECRET};

const TIMEOUT: Duration = Duration::from_secs(10);

// -- Basics -------------------------------------------------------------------

#[tokio::test]
async fn health_reports_running() -> anyhow::Result<()> {
    let provider = StubProvider::spawn().await?;
    let gate = WicketProcess::start(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", gate.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert!(resp["session_count"].is_number());
    Ok(())
}

#[tokio::test]
async fn anonymous_protected_get_bounces_to_login() -> anyhow::Result<()> {
    let provider = StubProvider::spawn().await?;
    let gate = WicketProcess::start(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let client = browser_no_redirect()?;
    let resp = client.get(format!("{}/eg/eg001", gate.base_url())).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);

    let loc = resp.headers().get("location").and_then(|v| v.to_str().ok()).unwrap_or("");
    assert_eq!(loc, "/auth/login");
    assert_eq!(provider.total_calls(), 0);
    Ok(())
}

// -- Grant flows --------------------------------------------------------------

#[tokio::test]
async fn browser_login_round_trip() -> anyhow::Result<()> {
    let provider =
        ProviderBuilder::new().expect_client(CLIENT_ID, CLIENT_SECRET).spawn().await?;
    let gate = WicketProcess::start(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let browser = browser()?;
    let resp = browser.get(format!("{}/auth/login", gate.base_url())).send().await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.url().path(), "/");

    let session: serde_json::Value =
        browser.get(format!("{}/api/v1/session", gate.base_url())).send().await?.json().await?;
    assert_eq!(session["authenticated"], true);
    assert_eq!(session["user_id"], "user-1");
    assert_eq!(session["account_id"], "acct-default");

    assert_eq!(provider.exchange_calls(), 1);
    assert_eq!(provider.userinfo_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn protected_operation_resumes_after_login() -> anyhow::Result<()> {
    let provider = StubProvider::spawn().await?;
    let gate = WicketProcess::start(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    // One GET rides the whole chain: login redirect, provider consent,
    // callback, then back to the page that started it.
    let browser = browser()?;
    let resp = browser.get(format!("{}/eg/eg001", gate.base_url())).send().await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.url().path(), "/eg/eg001");

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["operation"], "eg/eg001");
    assert_eq!(body["account_id"], "acct-default");
    assert_eq!(body["base_path"], "https://acct-default.api.example.com/restapi");
    Ok(())
}

#[tokio::test]
async fn target_account_flag_selects_the_account() -> anyhow::Result<()> {
    let provider = ProviderBuilder::new()
        .accounts(vec![account("acct-a", "A", true), account("acct-b", "B", false)])
        .spawn()
        .await?;
    let gate = WicketProcess::build().target_account("acct-b").spawn(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let browser = browser()?;
    browser.get(format!("{}/auth/login", gate.base_url())).send().await?;

    let session: serde_json::Value =
        browser.get(format!("{}/api/v1/session", gate.base_url())).send().await?.json().await?;
    assert_eq!(session["account_id"], "acct-b");
    assert_eq!(session["account_name"], "B");
    Ok(())
}

// -- Token lifecycle ----------------------------------------------------------

#[tokio::test]
async fn stale_token_refreshes_without_interactive_login() -> anyhow::Result<()> {
    let provider = ProviderBuilder::new().expires_in(30).spawn().await?;
    let gate = WicketProcess::start(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let browser = browser()?;
    browser.get(format!("{}/auth/login", gate.base_url())).send().await?;
    assert_eq!(provider.auth_calls(), 1);

    // Next grant hands out a long-lived token.
    provider.set_expires_in(7200);

    let resp = browser.get(format!("{}/eg/eg001", gate.base_url())).send().await?;
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["operation"], "eg/eg001");

    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(provider.auth_calls(), 1, "refresh must not bounce through the provider UI");
    Ok(())
}

#[tokio::test]
async fn revoked_refresh_token_forces_a_fresh_login() -> anyhow::Result<()> {
    let provider = ProviderBuilder::new().expires_in(30).spawn().await?;
    let gate = WicketProcess::start(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let browser = browser()?;
    browser.get(format!("{}/auth/login", gate.base_url())).send().await?;

    provider.set_refresh_failure(Some(TokenFailure::InvalidGrant)).await;
    provider.set_expires_in(7200);

    // The rejected refresh falls back to the code grant and still ends
    // on the requested page.
    let resp = browser.get(format!("{}/eg/eg001", gate.base_url())).send().await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.url().path(), "/eg/eg001");

    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(provider.exchange_calls(), 2);
    assert_eq!(provider.auth_calls(), 2);
    Ok(())
}

// -- Logout and restart -------------------------------------------------------

#[tokio::test]
async fn logout_lands_on_prompt_and_clears_session() -> anyhow::Result<()> {
    let provider = StubProvider::spawn().await?;
    let gate = WicketProcess::start(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let browser = browser()?;
    browser.get(format!("{}/auth/login", gate.base_url())).send().await?;

    let resp = browser.get(format!("{}/auth/logout", gate.base_url())).send().await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.url().path(), "/auth/prompt");
    assert_eq!(resp.url().query(), Some("reason=logged-out"));
    assert!(resp.text().await?.contains("You are signed out."));

    let session: serde_json::Value =
        browser.get(format!("{}/api/v1/session", gate.base_url())).send().await?.json().await?;
    assert_eq!(session["authenticated"], false);
    Ok(())
}

#[tokio::test]
async fn session_does_not_survive_a_restart() -> anyhow::Result<()> {
    let provider = StubProvider::spawn().await?;
    let state_dir = tempfile::tempdir()?;

    let gate =
        WicketProcess::build().state_dir(state_dir.path()).spawn(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    let browser = browser()?;
    browser.get(format!("{}/auth/login", gate.base_url())).send().await?;
    assert_eq!(provider.auth_calls(), 1);
    drop(gate);

    let gate =
        WicketProcess::build().state_dir(state_dir.path()).spawn(&provider.base_url())?;
    gate.wait_healthy(TIMEOUT).await?;

    // Sessions are in-memory, so the new process sends the browser back
    // through the provider even though the durable store was reused.
    let resp = browser.get(format!("{}/eg/eg001", gate.base_url())).send().await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.url().path(), "/eg/eg001");
    assert_eq!(provider.auth_calls(), 2);
    Ok(())
}
