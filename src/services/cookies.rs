//! Cookie building for session management
//!
//! Centralizes Set-Cookie formatting so login, refresh and logout stay
//! consistent.

use axum::http::{HeaderValue, StatusCode};

/// Access token cookie name
pub const ACCESS_TOKEN_NAME: &str = "access_token";
/// Refresh token cookie name
pub const REFRESH_TOKEN_NAME: &str = "refresh_token";

const ACCESS_TOKEN_MAX_AGE_SECS: u32 = 15 * 60;
const REFRESH_TOKEN_MAX_AGE_SECS: u32 = 30 * 24 * 60 * 60;

fn is_dev() -> bool {
    std::env::var("ENV").as_deref() != Ok("prod")
}

fn build_cookie(name: &str, value: &str, max_age: u32) -> Result<HeaderValue, StatusCode> {
    let secure = if is_dev() { "" } else { " Secure;" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        name, value, secure, max_age
    );
    cookie.parse().map_err(|_| {
        eprintln!("Failed to parse {} cookie header", name);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build an access token Set-Cookie header value
pub fn build_access_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build_cookie(ACCESS_TOKEN_NAME, token, ACCESS_TOKEN_MAX_AGE_SECS)
}

/// Build a refresh token Set-Cookie header value
pub fn build_refresh_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build_cookie(REFRESH_TOKEN_NAME, token, REFRESH_TOKEN_MAX_AGE_SECS)
}

/// Build a Set-Cookie header to clear the access token
pub fn build_clear_access_cookie() -> HeaderValue {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        ACCESS_TOKEN_NAME
    )
    .parse()
    .expect("static cookie string should always parse")
}

/// Build a Set-Cookie header to clear the refresh token
pub fn build_clear_refresh_cookie() -> HeaderValue {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        REFRESH_TOKEN_NAME
    )
    .parse()
    .expect("static cookie string should always parse")
}
