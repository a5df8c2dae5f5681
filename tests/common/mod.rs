//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use web_dispatch::config::TlsConfig;
use web_dispatch::http::{HttpServer, Payload};
use web_dispatch::routing::HandlerResult;
use web_dispatch::{Controller, ServerConfig, SessionStore};

/// An in-process app with its own static root.
pub struct TestApp {
    pub router: Router,
    pub sessions: Arc<SessionStore>,
    pub dist: TempDir,
}

pub fn ok(v: Value) -> HandlerResult {
    Ok(Payload::from(v))
}

pub fn test_config(dist: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.static_root = dist.to_path_buf();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.tls = Some(TlsConfig {
        cert_path: dist.join("cert.pem"),
        key_path: dist.join("key.pem"),
    });
    config
}

/// Build an app over `root` with a fresh store.
pub fn app(root: Controller) -> TestApp {
    app_with(root, |_| {})
}

/// Build an app, letting the caller tweak the config first.
pub fn app_with(root: Controller, tweak: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dist = tempfile::tempdir().unwrap();
    let mut config = test_config(dist.path());
    tweak(&mut config);

    let sessions = Arc::new(
        SessionStore::new(config.session.id_length)
            .adopt_unknown_ids(config.session.adopt_unknown_ids),
    );
    let router = HttpServer::new(config, Arc::new(root), sessions.clone()).router();
    TestApp {
        router,
        sessions,
        dist,
    }
}

/// Send a request through the router.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: &str,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = cookie {
        builder = builder.header(header::COOKIE, format!("sessionid={}", id));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

pub async fn get(router: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    send(router, Method::GET, uri, cookie, "").await
}

/// Session id from the response's `Set-Cookie` header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "sessionid")
        .map(|(_, v)| v.to_string())
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
