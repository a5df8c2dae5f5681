//! Session cookie binding.
//!
//! The cookie is reissued on every resolved request, so its expiry slides
//! forward from the client's point of view. The store itself never expires
//! anything based on the cookie.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Find the value of cookie `name` in the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
}

/// Settings for the `Set-Cookie` header issued with each response.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    ttl: Duration,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the cookie for `id`, expiring `ttl` after `now`.
    pub fn render(&self, id: &str, now: DateTime<Utc>) -> String {
        let expires = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(now);

        format!(
            "{}={}; Path=/; Expires={}; Max-Age={}; Secure; HttpOnly; SameSite=Strict",
            self.name,
            id,
            expires.format("%a, %d %b %Y %H:%M:%S GMT"),
            self.ttl.as_secs(),
        )
    }

    /// `Set-Cookie` header value, or `None` if the id is not a valid header value.
    pub fn header_value(&self, id: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.render(id, Utc::now())).ok()
    }
}
