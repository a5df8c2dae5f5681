//! End-to-end dispatch behavior through the full middleware stack.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use common::{app, app_with, body_bytes, body_json, get, ok, send, session_cookie};
use web_dispatch::http::{JsonResponse, RequestContext};
use web_dispatch::routing::{Handler, HandlerArgs, HandlerError, HandlerFuture, HandlerResult};
use web_dispatch::{handler, Controller, SessionHandle};

fn counting(calls: &Arc<AtomicUsize>) -> Arc<dyn Handler> {
    let calls = calls.clone();
    handler::session(move |_session: SessionHandle| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            ok(json!("done"))
        }
    })
}

async fn bind_user(session: SessionHandle, request: RequestContext) -> HandlerResult {
    if let Some(user) = request.form_params().get("user") {
        session.set_user(user.as_str());
    }
    Ok(JsonResponse::new().into())
}

struct ThreeArgs;

impl Handler for ThreeArgs {
    fn arity(&self) -> usize {
        3
    }

    fn call(&self, _args: HandlerArgs) -> HandlerFuture {
        Box::pin(async { ok(json!(null)) })
    }
}

async fn login_session(router: &axum::Router) -> String {
    let response = get(router, "/Login", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).expect("login sets a session cookie")
}

#[tokio::test]
async fn test_login_without_cookie_creates_session() {
    let calls = Arc::new(AtomicUsize::new(0));
    let test = app(Controller::new().handler("Login", counting(&calls)));

    let response = get(&test.router, "/Login", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let id = session_cookie(&response).unwrap();
    assert_eq!(id.len(), 24);
    assert!(test.sessions.lookup(&id).is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_new_session_redirects_to_login() {
    let calls = Arc::new(AtomicUsize::new(0));
    let test = app(Controller::new()
        .handler("Login", counting(&Arc::new(AtomicUsize::new(0))))
        .handler("Dashboard", counting(&calls)));

    let response = get(&test.router, "/Dashboard", None).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/Login");
    assert!(session_cookie(&response).is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_existing_session_reaches_plain_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let test = app(Controller::new()
        .handler("Login", counting(&Arc::new(AtomicUsize::new(0))))
        .handler("Dashboard", counting(&calls)));
    let id = login_session(&test.router).await;

    let response = get(&test.router, "/Dashboard", Some(&id)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_cookie(&response).as_deref(), Some(id.as_str()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gated_path_requires_user() {
    let calls = Arc::new(AtomicUsize::new(0));
    let test = app(Controller::new()
        .handler("Login", handler::request(bind_user))
        .gated("Account", Controller::new().handler("Profile", counting(&calls))));
    let id = login_session(&test.router).await;

    let response = get(&test.router, "/Account/Profile", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/Login");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let response = send(&test.router, Method::POST, "/Login", Some(&id), "user=alice").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&test.router, "/Account/Profile", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_arity_is_a_server_error() {
    let test = app(Controller::new()
        .handler("Login", counting(&Arc::new(AtomicUsize::new(0))))
        .handler("Broken", Arc::new(ThreeArgs)));
    let id = login_session(&test.router).await;

    let response = get(&test.router, "/Broken", Some(&id)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_handler_error_and_panic_are_server_errors() {
    let test = app(Controller::new()
        .handler("Login", counting(&Arc::new(AtomicUsize::new(0))))
        .handler(
            "Fails",
            handler::session(|_s: SessionHandle| async {
                let failed: HandlerResult = Err(HandlerError::new("backend down"));
                failed
            }),
        )
        .handler(
            "Panics",
            handler::session(|_s: SessionHandle| async {
                if true {
                    panic!("handler bug");
                }
                ok(json!(null))
            }),
        ));
    let id = login_session(&test.router).await;

    let response = get(&test.router, "/Fails", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(response).await.is_empty());

    let response = get(&test.router, "/Panics", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn test_raw_data_is_wrapped_in_envelope() {
    let test = app(Controller::new().handler(
        "Login",
        handler::session(|_s: SessionHandle| async { ok(json!({ "answer": 42 })) }),
    ));

    let response = get(&test.router, "/Login", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(
        body_json(response).await,
        json!({ "session": true, "errors": [], "data": { "answer": 42 } })
    );
}

#[tokio::test]
async fn test_request_handler_sees_json_body() {
    let test = app(Controller::new().handler(
        "Login",
        handler::request(|_s: SessionHandle, request: RequestContext| async move {
            let params = request.json_params()?;
            ok(json!({ "echo": params.get("name") }))
        }),
    ));

    let response = send(&test.router, Method::POST, "/Login", None, r#"{"name":"bob"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!({ "echo": "bob" }));
}

#[tokio::test]
async fn test_static_fallback_serves_file() {
    let test = app(Controller::new());
    let assets = test.dist.path().join("assets").join("img");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("logo.png"), b"png-bytes").unwrap();

    let response = get(&test.router, "/assets/img/logo.png", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert_eq!(body_bytes(response).await, b"png-bytes");
}

#[tokio::test]
async fn test_static_fallback_walks_up_to_index() {
    let test = app(Controller::new());
    let assets = test.dist.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("index.html"), "<h1>assets</h1>").unwrap();

    let response = get(&test.router, "/assets/app/deep/route", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<h1>assets</h1>");
}

#[tokio::test]
async fn test_unmatched_path_is_not_found() {
    let test = app(Controller::new());

    let response = get(&test.router, "/nothing/here", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cookie_attributes() {
    let test = app(Controller::new().handler("Login", counting(&Arc::new(AtomicUsize::new(0)))));

    let response = get(&test.router, "/Login", None).await;
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();

    assert!(cookie.starts_with("sessionid="));
    assert!(cookie.contains("; Path=/"));
    assert!(cookie.contains("; Max-Age=900"));
    assert!(cookie.contains("; Expires="));
    assert!(cookie.contains("; Secure"));
    assert!(cookie.contains("; HttpOnly"));
    assert!(cookie.contains("; SameSite=Strict"));
}

#[tokio::test]
async fn test_unknown_cookie_gets_fresh_session() {
    let calls = Arc::new(AtomicUsize::new(0));
    let test = app(Controller::new()
        .handler("Login", counting(&Arc::new(AtomicUsize::new(0))))
        .handler("Dashboard", counting(&calls)));

    let response = get(&test.router, "/Dashboard", Some("forgedid")).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let issued = session_cookie(&response).unwrap();
    assert_ne!(issued, "forgedid");
    assert!(test.sessions.lookup("forgedid").is_none());
}

#[tokio::test]
async fn test_unknown_cookie_adopted_when_enabled() {
    let calls = Arc::new(AtomicUsize::new(0));
    let test = app_with(
        Controller::new()
            .handler("Login", counting(&Arc::new(AtomicUsize::new(0))))
            .handler("Dashboard", counting(&calls)),
        |config| config.session.adopt_unknown_ids = true,
    );

    let response = get(&test.router, "/Dashboard", Some("carriedover")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_cookie(&response).as_deref(), Some("carriedover"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

fn slow_login() -> Controller {
    Controller::new().handler(
        "Login",
        handler::session(|_s: SessionHandle| async {
            tokio::time::sleep(Duration::from_secs(31)).await;
            ok(json!("finally"))
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn test_slow_handler_is_not_cut_off_by_default() {
    let test = app(slow_login());

    let response = get(&test.router, "/Login", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let id = session_cookie(&response).unwrap();
    assert!(test.sessions.lookup(&id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_when_configured() {
    let test = app_with(slow_login(), |config| config.timeouts.request_secs = Some(5));

    let response = get(&test.router, "/Login", None).await;

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let test = app_with(
        Controller::new().handler(
            "Login",
            handler::request(|_s: SessionHandle, request: RequestContext| async move {
                ok(json!(request.body().len()))
            }),
        ),
        |config| config.security.max_body_size = 16,
    );

    let response = send(&test.router, Method::POST, "/Login", None, &"x".repeat(17)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(session_cookie(&response).is_some());

    let response = send(&test.router, Method::POST, "/Login", None, &"x".repeat(16)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!(16));
}
