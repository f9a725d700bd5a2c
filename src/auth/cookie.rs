use axum::http::{HeaderMap, HeaderValue};

use super::jwt::SESSION_TTL;

pub const SESSION_COOKIE: &str = "token";

fn attributes(secure: bool) -> &'static str {
    if secure {
        "HttpOnly; Secure; SameSite=Lax; Path=/"
    } else {
        "HttpOnly; SameSite=Lax; Path=/"
    }
}

pub fn session_cookie(token: &str, secure: bool) -> anyhow::Result<HeaderValue> {
    let value = format!(
        "{}={}; Max-Age={}; {}",
        SESSION_COOKIE,
        token,
        SESSION_TTL.as_secs(),
        attributes(secure)
    );
    Ok(HeaderValue::from_str(&value)?)
}

pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    let value = format!(
        "{}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; {}",
        SESSION_COOKIE,
        attributes(secure)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .find_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            (k == name).then(|| v.to_string())
        })
}
