//! MCP (Model Context Protocol) trap: a JSON-RPC 2.0 endpoint exposing
//! persona-specific fictional tools.
//!
//! The handler is stateless; every outcome, success or protocol error,
//! travels in the JSON-RPC envelope over HTTP 200. Tool results are
//! deterministic canary-stamped fiction; no attacker input is executed.

use crate::interpolate;
use crate::models::TrapType;
use crate::server::AppState;
use crate::traps::{TrapMeta, base_vars};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde_json::{Value, json};
use std::time::Duration;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

pub fn routes() -> Router<AppState> {
    Router::new().route("/mcp", post(mcp_endpoint))
}

async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    tokio::time::sleep(Duration::from_millis(state.persona.response_latency_ms)).await;

    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return respond(jsonrpc_error(Value::Null, PARSE_ERROR, "Parse error"));
        }
    };

    let Some(request) = payload.as_object() else {
        return respond(jsonrpc_error(Value::Null, INVALID_REQUEST, "Invalid Request"));
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    let params = request
        .get("params")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let envelope = match method {
        "notifications/initialized" => json!({}),
        "initialize" => handle_initialize(&state, id),
        "tools/list" => handle_tools_list(&state, id),
        "tools/call" => handle_tools_call(&state, id, &params),
        other => jsonrpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {other}")),
    };

    respond(envelope)
}

fn respond(envelope: Value) -> Response {
    let mut response = (StatusCode::OK, Json(envelope)).into_response();
    response
        .extensions_mut()
        .insert(TrapMeta::new(TrapType::Mcp, "/mcp"));
    response
}

// ─── Method handlers ────────────────────────────────────────────────────────

fn handle_initialize(state: &AppState, id: Value) -> Value {
    jsonrpc_result(
        id,
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {"listChanged": false},
            },
            "serverInfo": {
                "name": state.persona.mcp_server_name,
                "version": "1.2.0",
            },
        }),
    )
}

fn handle_tools_list(state: &AppState, id: Value) -> Value {
    let prefix = &state.persona.mcp_tool_prefix;
    let tools: Vec<Value> = super::tooldefs::tool_definitions(state.persona.industry)
        .into_iter()
        .map(|mut def| {
            if let Some(name) = def.get("name").and_then(Value::as_str) {
                let prefixed = format!("{prefix}{name}");
                def["name"] = Value::String(prefixed);
            }
            def
        })
        .collect();

    jsonrpc_result(id, json!({"tools": tools}))
}

fn handle_tools_call(
    state: &AppState,
    id: Value,
    params: &serde_json::Map<String, Value>,
) -> Value {
    let raw_name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let prefix = &state.persona.mcp_tool_prefix;
    let bare_name = raw_name.strip_prefix(prefix.as_str()).unwrap_or(raw_name);

    let Some(template) = super::tooldefs::call_result(state.persona.industry, bare_name) else {
        return jsonrpc_error(id, INVALID_PARAMS, &format!("Unknown tool: {raw_name}"));
    };

    let vars = base_vars(&state.persona, bare_name);
    let content = interpolate::render_value(&template, &vars);
    let text = content.to_string();

    jsonrpc_result(
        id,
        json!({
            "content": [{"type": "text", "text": text}],
        }),
    )
}

// ─── Envelope helpers ───────────────────────────────────────────────────────

fn jsonrpc_result(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn jsonrpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}
