// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session cookie handling.
//!
//! The browser session is a random id inside an encrypted, HttpOnly
//! cookie. Handlers call [`session_id`] first; it reuses the existing
//! id or mints one and queues the Set-Cookie on the returned jar.

use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::PrivateCookieJar;
use time::Duration;

use crate::config::Config;
use crate::web::CookieKey;

const SESSION_COOKIE: &str = "wicket_session";

/// Session id from the cookie, minting a fresh one if absent.
pub fn session_id(
    jar: PrivateCookieJar<CookieKey>,
    config: &Config,
) -> (PrivateCookieJar<CookieKey>, String) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let sid = cookie.value().to_string();
        return (jar, sid);
    }

    let sid = uuid::Uuid::new_v4().to_string();
    let cookie = Cookie::build((SESSION_COOKIE, sid.clone()))
        .http_only(true)
        .secure(config.app_url.starts_with("https"))
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(config.session_ttl_secs as i64))
        .build();
    (jar.add(cookie), sid)
}

/// Removal jar for logout.
pub fn clear_session(jar: PrivateCookieJar<CookieKey>) -> PrivateCookieJar<CookieKey> {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();
    jar.remove(cookie)
}
