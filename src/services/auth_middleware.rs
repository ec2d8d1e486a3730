// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Session cookie helpers.

use tower_cookies::{Cookie, Cookies};

/// Cookie name for the session.
pub const SESSION_COOKIE_NAME: &str = "site_admin_session";

/// Extract the session token from cookies.
pub fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Create a session cookie with the given token.
pub fn create_session_cookie(token: &str, max_age_days: u64, secure: bool) -> Cookie<'static> {
    let max_age_secs = max_age_days * 24 * 60 * 60;
    Cookie::build((SESSION_COOKIE_NAME, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(tower_cookies::cookie::SameSite::Lax)
        .max_age(tower_cookies::cookie::time::Duration::seconds(
            max_age_secs as i64,
        ))
        .build()
}

/// Create a cookie that clears the session (for logout).
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build()
}
