//! Shared harness for integration tests: a full router over an in-memory
//! database, with the source address injected per request.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use feint::config::Config;
use feint::persona::engine::PersonaEngine;
use feint::server::{AppState, build_router};
use feint::storage::Storage;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _data_dir: tempfile::TempDir,
}

pub async fn app_for_seed(seed: u64) -> TestApp {
    let config = Config::default();
    let data_dir = tempfile::tempdir().unwrap();
    let persona = feint::persona::generator::generate(Some(seed));
    let engine =
        PersonaEngine::initialize(persona.clone(), &config.llm, data_dir.path(), false).await;
    let storage = Arc::new(Storage::in_memory().await.unwrap());
    let state = AppState::new(persona, engine, storage);
    let router = build_router(state.clone(), &config);
    TestApp {
        router,
        state,
        _data_dir: data_dir,
    }
}

pub const DEFAULT_IP: [u8; 4] = [198, 51, 100, 23];

pub fn request(method: &str, uri: &str, ip: [u8; 4]) -> Request<Body> {
    request_with(method, uri, ip, &[], Body::empty())
}

pub fn request_with(
    method: &str,
    uri: &str,
    ip: [u8; 4],
    headers: &[(&str, &str)],
    body: Body,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut req = builder.body(body).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 44321))));
    req
}

pub async fn send(app: &TestApp, req: Request<Body>) -> Response {
    app.router.clone().oneshot(req).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Header pairs that read as a real desktop browser.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "user-agent",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ),
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip, deflate, br"),
    ("referer", "https://intranet.example.test/portal"),
];

/// Header pairs typical of a scripted HTTP client.
pub const SCRIPTED_HEADERS: &[(&str, &str)] = &[
    ("user-agent", "python-httpx/0.27.0"),
    ("accept", "application/json"),
];
