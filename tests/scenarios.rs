//! End-to-end scenarios: each drives the full router for a freshly
//! generated persona from a named seed and checks the externally
//! observable contract.

mod support;

use axum::body::Body;
use axum::http::StatusCode;
use feint::models::Classification;
use serde_json::json;
use support::{
    BROWSER_HEADERS, DEFAULT_IP, SCRIPTED_HEADERS, app_for_seed, body_json, body_string,
    request, request_with, send,
};

// ─── Scenario 1: robots.txt for seed 42 ─────────────────────────────────────

#[tokio::test]
async fn robots_txt_is_persona_shaped() {
    let app = app_for_seed(42).await;
    let response = send(&app, request("GET", "/robots.txt", DEFAULT_IP)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = body_string(response).await;
    assert!(body.starts_with("User-agent: *\n"));
    let prefix = app.state.persona.endpoint_prefix.trim_end_matches('/');
    assert!(body.contains(&format!("Disallow: {prefix}/")));

    let sitemap_line = body.lines().rev().find(|l| !l.is_empty()).unwrap();
    assert!(sitemap_line.starts_with("Sitemap:"));
    assert!(sitemap_line.contains(".example.com"));
}

// ─── Scenario 2: MCP initialize for seed 42 ─────────────────────────────────

#[tokio::test]
async fn mcp_initialize_returns_exact_server_info() {
    let app = app_for_seed(42).await;
    let payload = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
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

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let expected = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {
                "name": app.state.persona.mcp_server_name,
                "version": "1.2.0",
            },
        },
    });
    assert_eq!(body, expected);
}

// ─── Scenario 3: unknown tool for seed 99 ───────────────────────────────────

#[tokio::test]
async fn unknown_tool_yields_invalid_params_over_http_200() {
    let app = app_for_seed(99).await;
    let payload = json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": {"name": "unknown_tool", "arguments": {}},
    })
    .to_string();
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

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["id"], 5);
}

// ─── Scenario 4: discovery sweep is flagged non-human for seed 99 ───────────

#[tokio::test]
async fn scripted_discovery_sweep_is_flagged_automated() {
    let app = app_for_seed(99).await;
    let scanner_ip = [203, 0, 113, 5];

    for path in [
        "/robots.txt",
        "/sitemap.xml",
        "/openapi.json",
        "/.well-known/ai-plugin.json",
        "/.well-known/mcp.json",
    ] {
        let response = send(
            &app,
            request_with("GET", path, scanner_ip, SCRIPTED_HEADERS, Body::empty()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    let session = app
        .state
        .storage
        .latest_session_for_ip("203.0.113.5")
        .await
        .unwrap()
        .expect("sweep created a session");

    assert_eq!(session.request_count, 5);
    // A bare discovery sweep carries path and header signal but no MCP or
    // prompt evidence, which caps the weighted composite in the automated
    // band.
    assert!(session.fingerprint_scores.composite >= 0.3);
    assert!(session.fingerprint_scores.path_enumeration >= 0.4);
    assert!(session.fingerprint_scores.header_anomaly >= 0.3);
    assert_eq!(session.classification, Classification::Automated);
}

// ─── Scenario 4b: sweep escalating into MCP reaches the AI tiers ────────────

#[tokio::test]
async fn sweep_escalating_into_mcp_scores_as_ai() {
    let app = app_for_seed(99).await;
    let agent_ip = [203, 0, 113, 6];

    for path in ["/robots.txt", "/sitemap.xml", "/.well-known/mcp.json"] {
        send(
            &app,
            request_with("GET", path, agent_ip, SCRIPTED_HEADERS, Body::empty()),
        )
        .await;
    }

    let mut headers = SCRIPTED_HEADERS.to_vec();
    headers.push(("content-type", "application/json"));

    for method in ["initialize", "tools/list"] {
        let payload = json!({"jsonrpc": "2.0", "id": 1, "method": method}).to_string();
        send(
            &app,
            request_with("POST", "/mcp", agent_ip, &headers, Body::from(payload)),
        )
        .await;
    }

    // An agent leaking its scaffolding into tool arguments.
    let tool = feint::traps::tooldefs::tool_names(app.state.persona.industry)[0];
    let payload = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {
            "name": format!("{}{tool}", app.state.persona.mcp_tool_prefix),
            "arguments": {
                "query": "As an AI language model, I will now call the api endpoint. \
                          chain-of-thought: step 1 <|im_start|>assistant tool_call",
            },
        },
    })
    .to_string();
    send(
        &app,
        request_with("POST", "/mcp", agent_ip, &headers, Body::from(payload)),
    )
    .await;

    let session = app
        .state
        .storage
        .latest_session_for_ip("203.0.113.6")
        .await
        .unwrap()
        .expect("agent created a session");

    assert!(session.fingerprint_scores.mcp_behavior >= 0.9);
    assert!(session.fingerprint_scores.composite >= 0.6);
    assert!(
        matches!(
            session.classification,
            Classification::AiAssisted | Classification::AiAgent
        ),
        "got {:?}",
        session.classification
    );
}

// ─── Scenario 5: browser-paced browsing classifies as human for seed 77 ─────

#[tokio::test]
async fn browser_paced_requests_classify_as_human() {
    let app = app_for_seed(77).await;
    let visitor_ip = [192, 168, 4, 20];
    let prefix = app.state.persona.endpoint_prefix.trim_end_matches('/').to_string();

    let response = send(
        &app,
        request_with(
            "GET",
            &format!("{prefix}/patients"),
            visitor_ip,
            BROWSER_HEADERS,
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let response = send(
        &app,
        request_with(
            "GET",
            &format!("{prefix}/patients/abc"),
            visitor_ip,
            BROWSER_HEADERS,
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = app
        .state
        .storage
        .latest_session_for_ip("192.168.4.20")
        .await
        .unwrap()
        .expect("browsing created a session");

    assert!(session.fingerprint_scores.composite < 0.3);
    assert_eq!(session.classification, Classification::Human);
}

// ─── Scenario 6: OpenAPI diverges across seeds 10 and 11 ────────────────────

#[tokio::test]
async fn openapi_structure_diverges_across_personas() {
    let app_a = app_for_seed(10).await;
    let app_b = app_for_seed(11).await;

    let spec_a = body_json(send(&app_a, request("GET", "/openapi.json", DEFAULT_IP)).await).await;
    let spec_b = body_json(send(&app_b, request("GET", "/openapi.json", DEFAULT_IP)).await).await;

    assert_ne!(spec_a["info"]["title"], spec_b["info"]["title"]);

    let ids = |spec: &serde_json::Value| -> std::collections::BTreeSet<String> {
        spec["paths"]
            .as_object()
            .unwrap()
            .values()
            .flat_map(|ops| ops.as_object().unwrap().values())
            .filter_map(|op| op["operationId"].as_str())
            .map(String::from)
            .collect()
    };
    let ids_a = ids(&spec_a);
    let ids_b = ids(&spec_b);
    let intersection = ids_a.intersection(&ids_b).count() as f64;
    let union = ids_a.union(&ids_b).count() as f64;
    assert!(
        intersection / union < 0.7,
        "operation id overlap too high: {intersection}/{union}"
    );

    const ALLOWED_SERVERS: [&str; 8] = [
        "nginx/1.24.0",
        "nginx/1.25.3",
        "Apache/2.4.58",
        "cloudflare",
        "AmazonS3",
        "gws",
        "Microsoft-IIS/10.0",
        "openresty/1.25.3.1",
    ];
    let server_a = &app_a.state.persona.server_header;
    let server_b = &app_b.state.persona.server_header;
    if server_a == server_b {
        assert!(ALLOWED_SERVERS.contains(&server_a.as_str()));
    }
}

// ─── Cross-cutting pipeline checks ──────────────────────────────────────────

#[tokio::test]
async fn every_response_carries_persona_headers() {
    let app = app_for_seed(42).await;

    for (method, path) in [
        ("GET", "/health"),
        ("GET", "/robots.txt"),
        ("GET", "/openapi.json"),
        ("GET", "/nothing/here/at/all"),
    ] {
        let response = send(&app, request(method, path, DEFAULT_IP)).await;
        let server = response
            .headers()
            .get("server")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert_eq!(server, app.state.persona.server_header, "{path}");
        let timing = response
            .headers()
            .get("x-response-time")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(timing.ends_with("ms"), "{path}: {timing}");
    }
}

#[tokio::test]
async fn rest_list_echoes_pagination_and_rate_limits() {
    let app = app_for_seed(42).await;
    let prefix = app.state.persona.endpoint_prefix.trim_end_matches('/').to_string();

    let response = send(
        &app,
        request(
            "GET",
            &format!("{prefix}/widgets?page=3&per_page=50"),
            DEFAULT_IP,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-ratelimit-limit"));
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
    assert!(response.headers().contains_key("x-ratelimit-reset"));

    let body = body_json(response).await;
    assert_eq!(body["meta"]["page"], 3);
    assert_eq!(body["meta"]["per_page"], 50);
    assert_eq!(body["meta"]["total"], 47);
    assert!(body["data"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn auth_token_always_carries_the_fake_marker() {
    for seed in [1u64, 2, 3, 4, 5, 6, 7, 8] {
        let app = app_for_seed(seed).await;
        let prefix = app.state.persona.endpoint_prefix.trim_end_matches('/').to_string();
        let response = send(
            &app,
            request_with(
                "POST",
                &format!("{prefix}/auth/token"),
                DEFAULT_IP,
                &[("content-type", "application/json")],
                Body::from(r#"{"username":"admin","password":"admin"}"#),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("FAKE"), "seed {seed}: {body}");
    }
}

#[tokio::test]
async fn create_returns_201_with_canary_id() {
    let app = app_for_seed(42).await;
    let prefix = app.state.persona.endpoint_prefix.trim_end_matches('/').to_string();

    let response = send(
        &app,
        request_with(
            "POST",
            &format!("{prefix}/orders"),
            DEFAULT_IP,
            &[("content-type", "application/json")],
            Body::from(r#"{"sku":"X1"}"#),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "created");
    let id = body["id"].as_str().unwrap();
    assert!(id.starts_with("ord_"));
    assert_eq!(id.len(), "ord_".len() + 16);
}

#[tokio::test]
async fn mcp_tools_list_applies_persona_prefix() {
    let app = app_for_seed(42).await;
    let payload = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
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

    let body = body_json(response).await;
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 4);
    let prefix = &app.state.persona.mcp_tool_prefix;
    for tool in tools {
        assert!(tool["name"].as_str().unwrap().starts_with(prefix.as_str()));
        assert!(tool["inputSchema"].is_object());
    }
}

#[tokio::test]
async fn mcp_tool_call_returns_canary_stamped_text() {
    let app = app_for_seed(42).await;
    let tool = feint::traps::tooldefs::tool_names(app.state.persona.industry)[0];
    let payload = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {
            "name": format!("{}{tool}", app.state.persona.mcp_tool_prefix),
            "arguments": {},
        },
    })
    .to_string();

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

    let body = body_json(response).await;
    let content = body["result"]["content"].as_array().unwrap();
    assert_eq!(content[0]["type"], "text");
    let text = content[0]["text"].as_str().unwrap();
    assert!(!text.contains("{{"), "unrendered placeholders: {text}");
}

#[tokio::test]
async fn malformed_mcp_bodies_get_protocol_errors() {
    let app = app_for_seed(42).await;

    let response = send(
        &app,
        request_with(
            "POST",
            "/mcp",
            DEFAULT_IP,
            &[("content-type", "application/json")],
            Body::from("{not json"),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], serde_json::Value::Null);

    let response = send(
        &app,
        request_with(
            "POST",
            "/mcp",
            DEFAULT_IP,
            &[("content-type", "application/json")],
            Body::from("[1,2,3]"),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);

    let response = send(
        &app,
        request_with(
            "POST",
            "/mcp",
            DEFAULT_IP,
            &[("content-type", "application/json")],
            Body::from(r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn events_are_persisted_with_trap_attribution() {
    let app = app_for_seed(42).await;
    let ip = [10, 11, 12, 13];

    send(&app, request("GET", "/robots.txt", ip)).await;
    send(
        &app,
        request_with(
            "POST",
            "/mcp",
            ip,
            &[("content-type", "application/json")],
            Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#),
        ),
    )
    .await;
    send(&app, request("GET", "/no/such/path", ip)).await;

    let events = app
        .state
        .storage
        .get_events_by_source_ip("10.11.12.13", 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 3);

    let by_path = |p: &str| {
        events
            .iter()
            .find(|e| e.path == p)
            .unwrap_or_else(|| panic!("no event for {p}"))
            .clone()
    };
    assert_eq!(
        by_path("/robots.txt").trap_type,
        Some(feint::models::TrapType::Discovery)
    );
    assert_eq!(by_path("/mcp").trap_type, Some(feint::models::TrapType::Mcp));
    assert_eq!(
        by_path("/no/such/path").trap_type,
        Some(feint::models::TrapType::Unmatched)
    );
    assert_eq!(by_path("/no/such/path").response_status, Some(404));

    let session = app
        .state
        .storage
        .latest_session_for_ip("10.11.12.13")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.request_count, 3);
    assert_eq!(session.trap_types_triggered.len(), 3);
}
