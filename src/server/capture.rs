//! Capture middleware: one wrapper around every route.
//!
//! Before the handler: snapshot source, method, path, query, headers, and
//! a bounded copy of the body. After the handler: link the event to its
//! session (persisting both before the response leaves), and stamp the
//! persona's `Server`, `X-Response-Time`, and interpolated extra headers.
//! A dropped task (client disconnect or deadline) still persists a
//! truncated event.

use crate::interpolate;
use crate::models::RequestEvent;
use crate::server::AppState;
use crate::sessions::SessionAggregator;
use crate::traps::TrapMeta;
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Most of a request body the capture layer will retain. Larger bodies are
/// truncated into the event and flagged.
pub const BODY_CAPTURE_LIMIT: usize = 65_536;

pub async fn capture_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let (source_ip, source_port) = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| (addr.ip().to_string(), Some(addr.port())))
        .unwrap_or_else(|| ("0.0.0.0".to_string(), None));

    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query_params = req
        .uri()
        .query()
        .map(parse_query)
        .unwrap_or_default();

    let mut headers = BTreeMap::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_lowercase(), value.to_string());
        }
    }
    let content_type = headers.get("content-type").cloned();
    let user_agent = headers.get("user-agent").cloned();

    let (parts, body) = req.into_parts();
    let (body_bytes, body_truncated) = read_body(body).await;

    let mut event = RequestEvent::new(source_ip.clone(), method, path);
    event.source_port = source_port;
    event.query_params = query_params;
    event.headers = headers;
    event.content_type = content_type.clone();
    event.user_agent = user_agent;
    if !body_bytes.is_empty() {
        let body_str = String::from_utf8_lossy(&body_bytes).into_owned();
        if content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
        {
            event.body_json = serde_json::from_str(&body_str).ok();
        }
        event.body = Some(body_str);
    }
    if body_truncated {
        append_note(&mut event, "body_truncated");
    }

    // If this future is dropped mid-flight the guard persists what we have.
    let mut guard = DisconnectGuard {
        inner: Some((event, state.aggregator.clone())),
    };

    let req = Request::from_parts(parts, Body::from(body_bytes));
    let mut response = next.run(req).await;

    let mut event = guard.disarm();
    let elapsed_ms = started.elapsed().as_millis();

    if let Some(meta) = response.extensions().get::<TrapMeta>() {
        event.trap_type = Some(meta.trap_type);
        event.matched_endpoint = meta.matched_endpoint.clone();
    }
    event.response_status = Some(response.status().as_u16());

    // The response is not emitted until the event is persisted and linked.
    if let Err(err) = state.aggregator.record(&mut event).await {
        warn!(error = %err, "failed to record request event");
        response = crate::traps::error_response(
            &state.persona,
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            "The service is temporarily unavailable",
        );
    }

    stamp_persona_headers(&state, &mut response, &source_ip, elapsed_ms);
    response
}

// ─── Pieces ─────────────────────────────────────────────────────────────────

fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Drain the request body into a bounded buffer. Returns the captured
/// bytes and whether anything was cut off (over the cap, body-limit layer
/// refusal, or client abort mid-body).
async fn read_body(mut body: Body) -> (Bytes, bool) {
    let mut buf: Vec<u8> = Vec::new();
    let mut truncated = false;

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                let Ok(data) = frame.into_data() else {
                    continue;
                };
                if buf.len() + data.len() > BODY_CAPTURE_LIMIT {
                    let take = BODY_CAPTURE_LIMIT - buf.len();
                    buf.extend_from_slice(&data[..take]);
                    truncated = true;
                    break;
                }
                buf.extend_from_slice(&data);
            }
            Some(Err(_)) => {
                truncated = true;
                break;
            }
            None => break,
        }
    }

    (Bytes::from(buf), truncated)
}

fn append_note(event: &mut RequestEvent, note: &str) {
    event.notes = Some(match event.notes.take() {
        Some(existing) => format!("{existing},{note}"),
        None => note.to_string(),
    });
}

fn stamp_persona_headers(
    state: &AppState,
    response: &mut Response,
    source_ip: &str,
    elapsed_ms: u128,
) {
    let context = BTreeMap::from([("source_ip".to_string(), source_ip.to_string())]);
    for (name, value_template) in &state.persona.extra_headers {
        let rendered = interpolate::render(value_template, Some(&context));
        if let (Ok(name), Ok(value)) = (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(&rendered),
        ) {
            response.headers_mut().insert(name, value);
        }
    }

    // Server and the measured wall time win over any extra-header template
    // with the same name.
    if let Ok(value) = HeaderValue::from_str(&state.persona.server_header) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("server"), value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms}ms")) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-response-time"), value);
    }
}

/// Persists a truncated event if the request task is dropped before the
/// handler completes (client disconnect or deadline).
struct DisconnectGuard {
    inner: Option<(RequestEvent, Arc<SessionAggregator>)>,
}

impl DisconnectGuard {
    fn disarm(&mut self) -> RequestEvent {
        self.inner
            .take()
            .expect("disconnect guard disarmed twice")
            .0
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let Some((mut event, aggregator)) = self.inner.take() else {
            return;
        };
        event.response_status = Some(0);
        append_note(&mut event, "client_disconnected");
        tokio::spawn(async move {
            if let Err(err) = aggregator.record(&mut event).await {
                warn!(error = %err, "failed to record disconnected request");
            }
        });
    }
}
