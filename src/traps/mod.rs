//! Trap surfaces: discovery manifests, the REST facade, and the MCP
//! JSON-RPC endpoint, plus the response helpers they share.

pub mod discovery;
pub mod mcp;
pub mod rest;
pub mod tooldefs;

use crate::canary;
use crate::models::{ErrorStyle, Persona, TrapType};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Attached to trap responses so the capture middleware can record which
/// surface matched without re-deriving routing.
#[derive(Debug, Clone)]
pub struct TrapMeta {
    pub trap_type: TrapType,
    pub matched_endpoint: Option<String>,
}

impl TrapMeta {
    pub fn new(trap_type: TrapType, matched_endpoint: impl Into<String>) -> Self {
        Self {
            trap_type,
            matched_endpoint: Some(matched_endpoint.into()),
        }
    }
}

/// Interpolation variables shared by every trap body: two canaries scoped
/// to the endpoint, a short id, timestamps, and the persona's domain.
pub fn base_vars(persona: &Persona, scope: &str) -> BTreeMap<String, String> {
    let salt = &Uuid::new_v4().simple().to_string()[..8];
    let canary_1 = canary::mint(persona, &format!("{scope}:1:{salt}"));
    let canary_2 = canary::mint(persona, &format!("{scope}:2:{salt}"));
    // Deterministic last octet in [1, 254], derived from the canary.
    let octet = u32::from_str_radix(&canary_1[..2], 16).unwrap_or(0) % 254 + 1;

    BTreeMap::from([
        ("canary_1".to_string(), canary_1),
        ("canary_2".to_string(), canary_2),
        (
            "short_id".to_string(),
            Uuid::new_v4().simple().to_string()[..8].to_string(),
        ),
        (
            "timestamp".to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (
            "request_id".to_string(),
            Uuid::new_v4().simple().to_string(),
        ),
        ("company_domain".to_string(), persona.company_domain()),
        ("octet".to_string(), octet.to_string()),
    ])
}

/// Rate-limit headers the REST facade always carries.
pub fn rate_limit_headers() -> [(HeaderName, String); 3] {
    let reset = Utc::now().timestamp() + 3600;
    [
        (HeaderName::from_static("x-ratelimit-limit"), "1000".to_string()),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            "997".to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-reset"),
            reset.to_string(),
        ),
    ]
}

pub fn apply_rate_limit_headers(response: &mut Response) {
    for (name, value) in rate_limit_headers() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
}

/// Build an error response in the persona's error style. Trap endpoints
/// never expose internals: the body is fabricated like everything else.
pub fn error_response(
    persona: &Persona,
    status: StatusCode,
    error_type: &str,
    message: &str,
) -> Response {
    let status_u16 = status.as_u16();

    match persona.error_style {
        ErrorStyle::Rfc7807 => {
            let title = error_type
                .split('_')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            let body = json!({
                "type": format!("about:blank#{error_type}"),
                "title": title,
                "status": status_u16,
                "detail": message,
                "instance": format!("/errors/{}", Uuid::new_v4().simple()),
            });
            (status, Json(body)).into_response()
        }
        ErrorStyle::Xml => {
            let body = format!(
                "<?xml version=\"1.0\"?>\n<error><code>{error_type}</code>\
                 <message>{message}</message><status>{status_u16}</status></error>"
            );
            (
                status,
                [(header::CONTENT_TYPE, "application/xml")],
                body,
            )
                .into_response()
        }
        ErrorStyle::Html => {
            let body = format!(
                "<html><body><h1>{status_u16}</h1><p>{message}</p></body></html>"
            );
            (status, [(header::CONTENT_TYPE, "text/html")], body).into_response()
        }
        ErrorStyle::SimpleJson => {
            let body = json!({
                "error": error_type,
                "message": message,
                "status": status_u16,
            });
            (status, Json(body)).into_response()
        }
    }
}
