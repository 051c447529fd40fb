//! Anti-fingerprinting checks.
//!
//! If a client can correlate deployments or spot the implementation, the
//! deception fails. These tests sweep several personas and assert that no
//! response leaks product or framework identity, no template placeholder
//! survives rendering, and structural surfaces diverge across seeds.

mod support;

use axum::body::Body;
use axum::http::StatusCode;
use serde_json::json;
use std::collections::BTreeSet;
use support::{DEFAULT_IP, app_for_seed, body_string, request, request_with, send};

/// Strings that must never appear in a response body or header (outside
/// the deliberate FAKE credential marker, which is checked separately).
const TELLS: &[&str] = &[
    "feint",
    "sundew",
    "honeypot",
    "canary",
    "deception",
    "decoy",
    "axum",
    "hyper",
    "tokio",
    "tower",
    "fastapi",
    "uvicorn",
];

/// Default server values that would reveal the real stack.
const LEAKY_SERVER_VALUES: &[&str] = &["axum", "hyper", "tower", "rust"];

const TEST_SEEDS: [u64; 5] = [3, 17, 42, 99, 1234];

fn surface_paths(prefix: &str) -> Vec<String> {
    vec![
        "/robots.txt".to_string(),
        "/sitemap.xml".to_string(),
        "/openapi.json".to_string(),
        "/.well-known/ai-plugin.json".to_string(),
        "/.well-known/mcp.json".to_string(),
        format!("{prefix}/records"),
        format!("{prefix}/records/42"),
        "/definitely/not/registered".to_string(),
    ]
}

#[tokio::test]
async fn no_tells_or_placeholders_in_any_surface() {
    for seed in TEST_SEEDS {
        let app = app_for_seed(seed).await;
        let prefix = app.state.persona.endpoint_prefix.trim_end_matches('/').to_string();

        for path in surface_paths(&prefix) {
            let response = send(&app, request("GET", &path, DEFAULT_IP)).await;

            for (name, value) in response.headers() {
                let header = format!("{name}: {}", value.to_str().unwrap_or_default());
                let lower = header.to_lowercase();
                for tell in TELLS {
                    assert!(!lower.contains(tell), "seed {seed} {path}: header {header}");
                }
            }

            let body = body_string(response).await.to_lowercase();
            assert!(!body.contains("{{"), "seed {seed} {path}: unrendered placeholder");
            for tell in TELLS {
                assert!(!body.contains(tell), "seed {seed} {path}: body contains {tell}");
            }
        }
    }
}

#[tokio::test]
async fn server_header_never_reveals_the_stack() {
    for seed in TEST_SEEDS {
        let app = app_for_seed(seed).await;
        let response = send(&app, request("GET", "/robots.txt", DEFAULT_IP)).await;
        let server = response
            .headers()
            .get("server")
            .unwrap()
            .to_str()
            .unwrap()
            .to_lowercase();
        for leaky in LEAKY_SERVER_VALUES {
            assert!(!server.contains(leaky), "seed {seed}: Server = {server}");
        }
    }
}

#[tokio::test]
async fn error_bodies_are_persona_styled_without_internals() {
    for seed in TEST_SEEDS {
        let app = app_for_seed(seed).await;
        let response = send(&app, request("GET", "/definitely/not/registered", DEFAULT_IP)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "seed {seed}");

        let body = body_string(response).await.to_lowercase();
        for fragment in ["panicked", "backtrace", "src/", ".rs:", "thread '"] {
            assert!(!body.contains(fragment), "seed {seed}: {body}");
        }
    }
}

#[tokio::test]
async fn invalid_mcp_input_never_returns_5xx() {
    let app = app_for_seed(42).await;
    for payload in [
        "",
        "{",
        "null",
        "[1,2]",
        "\"just a string\"",
        r#"{"jsonrpc":"1.0"}"#,
        r#"{"jsonrpc":"2.0","id":1,"method":"shutdown"}"#,
    ] {
        let response = send(
            &app,
            request_with(
                "POST",
                "/mcp",
                DEFAULT_IP,
                &[("content-type", "application/json")],
                Body::from(payload),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "payload {payload:?}");
    }
}

#[tokio::test]
async fn discovery_surfaces_diverge_across_seeds() {
    let mut robots = BTreeSet::new();
    let mut titles = BTreeSet::new();
    let mut tool_sets = BTreeSet::new();

    for seed in TEST_SEEDS {
        let app = app_for_seed(seed).await;

        let body = body_string(send(&app, request("GET", "/robots.txt", DEFAULT_IP)).await).await;
        robots.insert(body);

        let spec = send(&app, request("GET", "/openapi.json", DEFAULT_IP)).await;
        let spec = body_string(spec).await;
        let spec: serde_json::Value = serde_json::from_str(&spec).unwrap();
        titles.insert(spec["info"]["title"].as_str().unwrap().to_string());

        let tools = send(
            &app,
            request_with(
                "POST",
                "/mcp",
                DEFAULT_IP,
                &[("content-type", "application/json")],
                Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#),
            ),
        )
        .await;
        let tools = body_string(tools).await;
        tool_sets.insert(tools);
    }

    // Five seeds should produce at least four distinct identities on each
    // surface; full collisions would mean the persona is not shaping output.
    assert!(robots.len() >= 4, "robots.txt too uniform: {}", robots.len());
    assert!(titles.len() >= 4, "OpenAPI titles too uniform: {}", titles.len());
    assert!(tool_sets.len() >= 3, "tool sets too uniform: {}", tool_sets.len());
}

#[tokio::test]
async fn fake_marker_is_present_exactly_where_intended() {
    let app = app_for_seed(42).await;
    let prefix = app.state.persona.endpoint_prefix.trim_end_matches('/').to_string();

    // Tokens carry the marker.
    let token = send(
        &app,
        request_with(
            "POST",
            &format!("{prefix}/auth/token"),
            DEFAULT_IP,
            &[("content-type", "application/json")],
            Body::from("{}"),
        ),
    )
    .await;
    assert!(body_string(token).await.contains("FAKE"));

    // Discovery surfaces stay clean of it.
    for path in ["/robots.txt", "/openapi.json", "/.well-known/mcp.json"] {
        let response = send(&app, request("GET", path, DEFAULT_IP)).await;
        assert!(
            !body_string(response).await.contains("FAKE"),
            "{path} leaks the credential marker"
        );
    }
}

#[tokio::test]
async fn canary_tokens_differ_between_deployments() {
    let app_a = app_for_seed(10).await;
    let app_b = app_for_seed(11).await;

    let call = |app: &support::TestApp| {
        let tool = feint::traps::tooldefs::tool_names(app.state.persona.industry)[0];
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": format!("{}{tool}", app.state.persona.mcp_tool_prefix),
                "arguments": {},
            },
        })
        .to_string()
    };

    let body_a = body_string(
        send(
            &app_a,
            request_with(
                "POST",
                "/mcp",
                DEFAULT_IP,
                &[("content-type", "application/json")],
                Body::from(call(&app_a)),
            ),
        )
        .await,
    )
    .await;
    let body_b = body_string(
        send(
            &app_b,
            request_with(
                "POST",
                "/mcp",
                DEFAULT_IP,
                &[("content-type", "application/json")],
                Body::from(call(&app_b)),
            ),
        )
        .await,
    )
    .await;

    assert_ne!(body_a, body_b);
}
