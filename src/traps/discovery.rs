//! AI discovery traps.
//!
//! The well-known files that agents and scanners probe first. Every byte is
//! derived from persona state, so two deployments never present the same
//! discovery surface.

use crate::models::{AuthScheme, Persona, TrapType};
use crate::persona::packs;
use crate::server::AppState;
use crate::traps::{TrapMeta, rest};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::Utc;
use serde_json::{Value, json};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/.well-known/ai-plugin.json", get(ai_plugin))
        .route("/.well-known/mcp.json", get(mcp_manifest))
        .route("/robots.txt", get(robots_txt))
        .route("/sitemap.xml", get(sitemap_xml))
        .route("/openapi.json", get(openapi_spec))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn ai_plugin(State(state): State<AppState>) -> Response {
    let mut response =
        (StatusCode::OK, Json(build_ai_plugin(&state.persona))).into_response();
    response.extensions_mut().insert(TrapMeta::new(
        TrapType::Discovery,
        "/.well-known/ai-plugin.json",
    ));
    response
}

async fn mcp_manifest(State(state): State<AppState>) -> Response {
    let mut response =
        (StatusCode::OK, Json(build_mcp_manifest(&state.persona))).into_response();
    response
        .extensions_mut()
        .insert(TrapMeta::new(TrapType::Discovery, "/.well-known/mcp.json"));
    response
}

async fn robots_txt(State(state): State<AppState>) -> Response {
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        build_robots_txt(&state.persona),
    )
        .into_response();
    response
        .extensions_mut()
        .insert(TrapMeta::new(TrapType::Discovery, "/robots.txt"));
    response
}

async fn sitemap_xml(State(state): State<AppState>) -> Response {
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        build_sitemap(&state.persona),
    )
        .into_response();
    response
        .extensions_mut()
        .insert(TrapMeta::new(TrapType::Discovery, "/sitemap.xml"));
    response
}

async fn openapi_spec(State(state): State<AppState>) -> Response {
    let mut response = (
        StatusCode::OK,
        Json(rest::build_openapi_spec(&state.persona)),
    )
        .into_response();
    response
        .extensions_mut()
        .insert(TrapMeta::new(TrapType::Discovery, "/openapi.json"));
    response
}

// ─── Builders ───────────────────────────────────────────────────────────────

/// OpenAI-style plugin manifest. Commonly probed by agents looking for
/// plugin integrations.
pub fn build_ai_plugin(persona: &Persona) -> Value {
    let domain = persona.company_domain();
    json!({
        "schema_version": "v1",
        "name_for_human": format!("{} API", persona.company_name),
        "name_for_model": persona.company_name.to_lowercase().replace(' ', "_"),
        "description_for_human": format!(
            "Access {}'s {} data and services through a secure API.",
            persona.company_name, persona.data_theme
        ),
        "description_for_model": format!(
            "Plugin for interacting with {}'s internal {} management system. \
             Supports CRUD operations on {} with authentication.",
            persona.company_name, persona.data_theme, persona.data_theme
        ),
        "auth": {
            "type": "service_http",
            "authorization_type": "bearer",
            "verification_tokens": {"openai": "placeholder"},
        },
        "api": {
            "type": "openapi",
            "url": format!("https://api.{domain}/openapi.json"),
            "is_user_authenticated": false,
        },
        "logo_url": format!("https://api.{domain}/logo.png"),
        "contact_email": format!("api-support@{domain}"),
        "legal_info_url": format!("https://{domain}/legal"),
    })
}

/// MCP discovery manifest: how to connect, what capabilities exist, and
/// how authentication pretends to work.
pub fn build_mcp_manifest(persona: &Persona) -> Value {
    let domain = persona.company_domain();
    let auth = match persona.auth_scheme {
        AuthScheme::Oauth2 => json!({
            "type": "oauth2",
            "token_url": format!(
                "https://api.{domain}{}",
                persona.endpoint("/auth/token")
            ),
            "scopes": ["read", "write"],
        }),
        AuthScheme::ApiKeyHeader | AuthScheme::ApiKeyQuery => json!({
            "type": "api_key",
            "token_url": format!(
                "https://api.{domain}{}",
                persona.endpoint("/auth/token")
            ),
        }),
        AuthScheme::Bearer | AuthScheme::Basic => json!({
            "type": "bearer",
            "token_url": format!(
                "https://api.{domain}{}",
                persona.endpoint("/auth/token")
            ),
        }),
    };

    json!({
        "mcp_version": "2024-11-05",
        "server": {
            "name": persona.mcp_server_name,
            "version": "1.2.0",
            "description": format!(
                "{} internal {} service accessible via Model Context Protocol.",
                persona.company_name, persona.data_theme
            ),
        },
        "endpoints": {
            "jsonrpc": format!("https://api.{domain}/mcp"),
        },
        "capabilities": {
            "tools": true,
            "resources": false,
            "prompts": false,
        },
        "authentication": auth,
    })
}

/// robots.txt whose Disallow entries are the trap paths themselves.
pub fn build_robots_txt(persona: &Persona) -> String {
    let prefix = persona.endpoint_prefix.trim_end_matches('/');
    let domain = persona.company_domain();

    let mut lines = vec!["User-agent: *".to_string()];
    lines.push(format!("Disallow: {prefix}/"));
    for fixed in ["/admin/", "/internal/", "/.well-known/"] {
        lines.push(format!("Disallow: {fixed}"));
    }
    for path in packs::disallowed_paths(persona.industry) {
        lines.push(format!("Disallow: {prefix}{path}"));
    }
    lines.push(String::new());
    lines.push(format!("Sitemap: https://api.{domain}/sitemap.xml"));
    lines.push(String::new());
    lines.join("\n")
}

/// Valid XML sitemap enumerating discovery and industry endpoints with
/// today's lastmod.
pub fn build_sitemap(persona: &Persona) -> String {
    let domain = persona.company_domain();
    let prefix = persona.endpoint_prefix.trim_end_matches('/');
    let today = Utc::now().format("%Y-%m-%d").to_string();

    let mut urls = vec![
        format!("https://api.{domain}/openapi.json"),
        format!("https://api.{domain}/.well-known/ai-plugin.json"),
        format!("https://api.{domain}/.well-known/mcp.json"),
    ];
    for path in packs::sitemap_paths(persona.industry) {
        urls.push(format!("https://api.{domain}{prefix}{path}"));
    }

    let entries: Vec<String> = urls
        .iter()
        .map(|url| {
            format!(
                "  <url>\n    <loc>{url}</loc>\n    <lastmod>{today}</lastmod>\n    \
                 <changefreq>weekly</changefreq>\n  </url>"
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}\n</urlset>\n",
        entries.join("\n")
    )
}
