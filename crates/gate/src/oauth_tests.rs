// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn client() -> ProviderClient {
    ProviderClient::new(&Config::test())
}

#[test]
fn authorize_url_carries_all_grant_params() {
    let url = client().authorize_url("st4te");
    assert!(url.starts_with("http://127.0.0.1:1/oauth/auth?"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("scope=signature"));
    assert!(url.contains("client_id=test-client"));
    assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A7080%2Fauth%2Fcallback"));
    assert!(url.contains("state=st4te"));
}

#[test]
fn authorize_url_percent_encodes_state() {
    let url = client().authorize_url("a b+c/d");
    assert!(url.contains("state=a%20b%2Bc%2Fd"));
}

#[test]
fn generated_states_are_unique_and_url_safe() {
    let a = generate_state();
    let b = generate_state();
    assert_ne!(a, b);
    // 32 random bytes, base64url without padding.
    assert_eq!(a.len(), 43);
    assert!(a
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[yare::parameterized(
    invalid_grant      = { r#"{"error":"invalid_grant"}"#, true },
    with_description   = { r#"{"error":"invalid_grant","error_description":"token revoked"}"#, true },
    consent_required   = { r#"{"error":"consent_required"}"#, false },
    html_error_page    = { "<html>bad gateway</html>", false },
    empty_body         = { "", false },
)]
fn grant_rejection_classification(body: &str, dead: bool) {
    let err = classify_grant_rejection(400, body);
    assert_eq!(matches!(err, ProviderError::InvalidGrant(_)), dead);
}

#[test]
fn invalid_grant_keeps_provider_description() {
    let err = classify_grant_rejection(
        400,
        r#"{"error":"invalid_grant","error_description":"token revoked"}"#,
    );
    match err {
        ProviderError::InvalidGrant(msg) => assert_eq!(msg, "token revoked"),
        other => panic!("expected InvalidGrant, got: {other}"),
    }
}

#[test]
fn token_response_tolerates_missing_optional_fields() {
    let token: TokenResponse = serde_json::from_str(r#"{"access_token":"at-1"}"#).unwrap();
    assert_eq!(token.access_token, "at-1");
    assert_eq!(token.refresh_token, None);
    assert_eq!(token.expires_in, 0);
}

#[test]
fn userinfo_parses_account_list() {
    let body = r#"{
        "sub": "user-1",
        "name": "Ada",
        "email": "ada@example.com",
        "accounts": [
            {"account_id": "a1", "account_name": "One", "base_uri": "https://one.example.com", "is_default": false},
            {"account_id": "a2", "account_name": "Two", "base_uri": "https://two.example.com", "is_default": true}
        ]
    }"#;
    let info: UserInfo = serde_json::from_str(body).unwrap();
    assert_eq!(info.sub, "user-1");
    assert_eq!(info.accounts.len(), 2);
    assert!(info.accounts[1].is_default);
}
