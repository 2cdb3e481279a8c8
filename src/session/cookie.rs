//! Session cookie handling.

use axum::http::{header, HeaderMap};

/// Extract the session id from the `Cookie` header(s).
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Render a `Set-Cookie` value for a session.
pub fn session_cookie(cookie_name: &str, session_id: &str) -> String {
    format!("{cookie_name}={session_id}; Path=/; HttpOnly; SameSite=Strict")
}
