//! Request wrapper handed to request-aware handlers.
//!
//! # Responsibilities
//! - Carry method, URI, headers and the buffered body
//! - Small extraction helpers (cookie, query, urlencoded form, JSON body)
//!
//! # Design Decisions
//! - Body is buffered up front (bounded by `security.max_body_size`) so the
//!   context is `'static` and can move into the handler future
//! - First value wins for repeated query/form keys

use std::collections::HashMap;

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, Method, Uri};
use serde_json::{Map, Value};

use crate::session::cookie::read_cookie;

/// The request as seen by an arity-2 handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    pub(crate) fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Value of the named cookie.
    pub fn cookie(&self, name: &str) -> Option<String> {
        read_cookie(&self.headers, name)
    }

    /// URL query parameters.
    pub fn query_params(&self) -> HashMap<String, String> {
        first_values(self.uri.query().unwrap_or_default().as_bytes())
    }

    /// `application/x-www-form-urlencoded` body parameters.
    pub fn form_params(&self) -> HashMap<String, String> {
        first_values(&self.body)
    }

    /// JSON object body. An empty body yields an empty object.
    pub fn json_params(&self) -> Result<Map<String, Value>, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        serde_json::from_slice(&self.body)
    }
}

fn first_values(input: &[u8]) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (k, v) in url::form_urlencoded::parse(input) {
        params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};
    use serde_json::json;

    fn context(uri: &str, body: &'static str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sessionid=abc; lang=it"));
        RequestContext::new(
            Method::POST,
            uri.parse().unwrap(),
            headers,
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_query_params_first_value_wins() {
        let ctx = context("/Search?q=rust&q=go&page=2&name=a%20b", "");
        let params = ctx.query_params();
        assert_eq!(params["q"], "rust");
        assert_eq!(params["page"], "2");
        assert_eq!(params["name"], "a b");
    }

    #[test]
    fn test_form_params() {
        let ctx = context("/Login", "user=alice&password=s%26cret");
        let form = ctx.form_params();
        assert_eq!(form["user"], "alice");
        assert_eq!(form["password"], "s&cret");
    }

    #[test]
    fn test_json_params() {
        let ctx = context("/Login", r#"{"user": "alice", "remember": true}"#);
        let body = ctx.json_params().unwrap();
        assert_eq!(body["user"], json!("alice"));
        assert_eq!(body["remember"], json!(true));

        assert!(context("/Login", "  ").json_params().unwrap().is_empty());
        assert!(context("/Login", "[1,2]").json_params().is_err());
    }

    #[test]
    fn test_cookie() {
        let ctx = context("/", "");
        assert_eq!(ctx.cookie("lang").as_deref(), Some("it"));
        assert_eq!(ctx.cookie("none"), None);
    }
}
