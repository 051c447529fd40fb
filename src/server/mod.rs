//! Axum-based HTTP core.
//!
//! Dispatches to the discovery, REST, and MCP traps in that order, wraps
//! every route in the capture middleware, and answers everything else with
//! a persona-styled 404 (after consulting the template engine). Proper
//! HTTP/1.1 parsing, body limits, and request deadlines come from axum and
//! tower-http.

mod capture;

pub use capture::{BODY_CAPTURE_LIMIT, capture_middleware};

use crate::config::Config;
use crate::interpolate;
use crate::models::{Persona, TrapType};
use crate::persona::engine::PersonaEngine;
use crate::persona::generator;
use crate::sessions::SessionAggregator;
use crate::storage::Storage;
use crate::traps::{self, TrapMeta};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

/// Maximum request body size accepted by the listener.
pub const MAX_BODY_SIZE: usize = 65_536;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub persona: Arc<Persona>,
    pub engine: Arc<PersonaEngine>,
    pub storage: Arc<Storage>,
    pub aggregator: Arc<SessionAggregator>,
}

impl AppState {
    pub fn new(persona: Persona, engine: PersonaEngine, storage: Arc<Storage>) -> Self {
        Self {
            persona: Arc::new(persona),
            engine: Arc::new(engine),
            aggregator: Arc::new(SessionAggregator::new(storage.clone())),
            storage,
        }
    }
}

/// Resolve the deployment persona from configuration: `auto` generates a
/// fresh identity, anything else is a path to a persisted persona.
pub fn resolve_persona(config: &Config) -> Persona {
    if config.persona == "auto" {
        return generator::generate(None);
    }

    match generator::load_persona(Path::new(&config.persona)) {
        Ok(persona) => persona,
        Err(err) => {
            warn!(
                path = %config.persona,
                error = %err,
                "persona file unavailable, generating a random persona"
            );
            generator::generate(None)
        }
    }
}

/// Assemble the full application: persona, template engine, storage, and
/// session tracking.
pub async fn build_state(config: &Config, force_regenerate: bool) -> Result<AppState> {
    let persona = resolve_persona(config);
    info!(
        company = %persona.company_name,
        industry = persona.industry.as_str(),
        theme = %persona.data_theme,
        "loaded persona"
    );

    let data_dir = config.data_dir();
    let engine =
        PersonaEngine::initialize(persona.clone(), &config.llm, &data_dir, force_regenerate)
            .await;

    let storage = Storage::open(
        Path::new(&config.storage.database),
        config.storage.log_file.as_deref().map(Path::new),
    )
    .await
    .context("open event storage")?;

    Ok(AppState::new(persona, engine, Arc::new(storage)))
}

/// Build the router with the configured trap surfaces mounted, the capture
/// middleware around every route, and the persona fallback.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let mut router = Router::new().route("/health", get(handle_health));

    if config.traps.ai_discovery {
        router = router.merge(traps::discovery::routes());
    }
    if config.traps.rest_api {
        router = router.merge(traps::rest::routes(&state.persona));
    }
    if config.traps.mcp_server {
        router = router.merge(traps::mcp::routes());
    }

    router
        .fallback(handle_unmatched)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, capture_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
}

/// Bind and serve until ctrl-c.
pub async fn run_server(config: Config, force_regenerate: bool) -> Result<()> {
    let state = build_state(&config, force_regenerate).await?;
    let template_count = state.engine.template_count();
    let router = build_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parse listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!(
        addr = %listener.local_addr()?,
        templates = template_count,
        "listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serve")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

// ─── Core handlers ──────────────────────────────────────────────────────────

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Requests no trap route claims: consult the template engine, then fail
/// with a persona-styled 404.
async fn handle_unmatched(
    State(state): State<AppState>,
    method: axum::http::Method,
    uri: Uri,
) -> Response {
    render_template_or_404(&state, method.as_str(), uri.path())
}

fn render_template_or_404(state: &AppState, method: &str, path: &str) -> Response {
    if let Some(template) = state.engine.get_template(method, path) {
        let mut vars = traps::base_vars(&state.persona, path);
        vars.insert("source_ip".to_string(), String::new());

        let body = interpolate::render(&template.body_template, Some(&vars));
        let status =
            StatusCode::from_u16(template.status_code).unwrap_or(StatusCode::OK);

        let mut response = (status, body).into_response();
        if let Ok(value) = HeaderValue::from_str(&template.content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        for (name, value_template) in &template.headers {
            let rendered = interpolate::render(value_template, Some(&vars));
            if let (Ok(name), Ok(value)) = (
                name.parse::<axum::http::HeaderName>(),
                HeaderValue::from_str(&rendered),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response.extensions_mut().insert(TrapMeta::new(
            TrapType::RestApi,
            template.endpoint.clone(),
        ));
        return response;
    }

    let mut response = traps::error_response(
        &state.persona,
        StatusCode::NOT_FOUND,
        "not_found",
        &format!("No route matches {method} {path}"),
    );
    response.extensions_mut().insert(TrapMeta {
        trap_type: TrapType::Unmatched,
        matched_endpoint: None,
    });
    response
}
