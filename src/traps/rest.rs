//! Adaptive REST facade.
//!
//! Persona-prefixed list/detail/create endpoints, an auth-token endpoint
//! that accepts anything, and a framework-appropriate documentation path.
//! Every deployment reads as a different internal service.

use crate::interpolate;
use crate::models::{AuthScheme, Persona, TrapType};
use crate::persona::packs;
use crate::server::AppState;
use crate::traps::{TrapMeta, apply_rate_limit_headers, base_vars};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

/// Build the REST trap routes for the persona's endpoint prefix.
pub fn routes(persona: &Persona) -> Router<AppState> {
    let prefix = persona.endpoint_prefix.trim_end_matches('/');

    Router::new()
        .route(&format!("{prefix}/auth/token"), post(auth_token))
        .route(&format!("{prefix}/{{resource}}"), get(list_resources))
        .route(&format!("{prefix}/{{resource}}"), post(create_resource))
        .route(&format!("{prefix}/{{resource}}/{{id}}"), get(get_resource))
        .route(
            &format!("{prefix}/{{resource}}/{{id}}/{{sub}}"),
            get(get_sub_resource),
        )
        .route(docs_path(persona), get(swagger_docs))
}

/// Swagger/OpenAPI documentation path implied by the framework the persona
/// pretends to run.
pub fn docs_path(persona: &Persona) -> &'static str {
    let fw = persona.framework_fingerprint.to_lowercase();
    if fw.contains("express") || fw.contains("nestjs") {
        "/api-docs"
    } else if fw.contains("django") || fw.contains("flask") || fw.contains("fastapi") {
        "/docs"
    } else if fw.contains("rails") {
        "/api/docs"
    } else if fw.contains("spring") {
        "/swagger-ui.html"
    } else if fw.contains("laravel") {
        "/api/documentation"
    } else {
        "/docs"
    }
}

async fn trap_latency(persona: &Persona) {
    tokio::time::sleep(Duration::from_millis(persona.response_latency_ms)).await;
}

// ─── Auth token ─────────────────────────────────────────────────────────────

/// Accept any credentials and return a scheme-appropriate token. Every
/// token embeds a canary and the FAKE marker so exfiltration is traceable.
async fn auth_token(State(state): State<AppState>) -> Response {
    trap_latency(&state.persona).await;

    let token_id = Uuid::new_v4().simple().to_string();
    let token = crate::canary::mint(&state.persona, &format!("auth:{token_id}"));
    let now = Utc::now();
    let expires_at = (now + ChronoDuration::seconds(3600))
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    let body = match state.persona.auth_scheme {
        AuthScheme::Oauth2 => json!({
            "access_token": format!("eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.FAKE.{token}"),
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": format!("rt_FAKE_{token}"),
            "scope": "read write",
        }),
        AuthScheme::Bearer => json!({
            "token": format!("{}{token}", crate::canary::FAKE_KEY_PREFIX),
            "type": "bearer",
            "expires_at": expires_at,
        }),
        AuthScheme::ApiKeyHeader | AuthScheme::ApiKeyQuery => json!({
            "api_key": format!("ak_FAKE_{token}"),
            "created_at": now.to_rfc3339_opts(SecondsFormat::Secs, true),
            "name": "generated-key",
        }),
        AuthScheme::Basic => json!({
            "session_id": format!("sess_FAKE_{token}"),
            "authenticated": true,
            "expires_at": expires_at,
        }),
    };

    let mut response = (StatusCode::OK, Json(body)).into_response();
    apply_rate_limit_headers(&mut response);
    response.extensions_mut().insert(TrapMeta::new(
        TrapType::RestApi,
        state.persona.endpoint("/auth/token"),
    ));
    response
}

// ─── Collection endpoints ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

impl ListQuery {
    /// Echo valid values, clamp everything else to the defaults.
    fn normalized(&self) -> (i64, i64) {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(1);
        let per_page = self
            .per_page
            .filter(|pp| (1..=100).contains(pp))
            .unwrap_or(25);
        (page, per_page)
    }
}

async fn list_resources(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    trap_latency(&state.persona).await;

    let (page, per_page) = query.normalized();
    let vars = base_vars(&state.persona, &format!("list:{resource}"));
    let data = interpolate::render_value(&packs::list_rows(state.persona.industry), &vars);
    let body = json!({
        "data": data,
        "meta": {
            "page": page,
            "per_page": per_page,
            "total": 47,
            "total_pages": 2,
        },
    });

    let mut response = (StatusCode::OK, Json(body)).into_response();
    apply_rate_limit_headers(&mut response);
    response.extensions_mut().insert(TrapMeta::new(
        TrapType::RestApi,
        state.persona.endpoint("/{resource}"),
    ));
    response
}

async fn get_resource(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Response {
    trap_latency(&state.persona).await;

    let vars = base_vars(&state.persona, &format!("detail:{resource}:{id}"));
    let body = interpolate::render_value(&packs::detail_row(state.persona.industry), &vars);

    let mut response = (StatusCode::OK, Json(body)).into_response();
    apply_rate_limit_headers(&mut response);
    response.extensions_mut().insert(TrapMeta::new(
        TrapType::RestApi,
        state.persona.endpoint("/{resource}/{id}"),
    ));
    response
}

async fn get_sub_resource(
    State(state): State<AppState>,
    Path((resource, id, sub)): Path<(String, String, String)>,
) -> Response {
    trap_latency(&state.persona).await;

    let vars = base_vars(&state.persona, &format!("sub:{resource}:{id}:{sub}"));
    let data = interpolate::render_value(&packs::list_rows(state.persona.industry), &vars);
    let body = json!({
        "data": data,
        "meta": {"page": 1, "per_page": 25, "total": 2, "total_pages": 1},
    });

    let mut response = (StatusCode::OK, Json(body)).into_response();
    apply_rate_limit_headers(&mut response);
    response.extensions_mut().insert(TrapMeta::new(
        TrapType::RestApi,
        state.persona.endpoint("/{resource}/{id}/{sub}"),
    ));
    response
}

async fn create_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Response {
    trap_latency(&state.persona).await;

    let salt = &Uuid::new_v4().simple().to_string()[..8];
    let token = crate::canary::mint(&state.persona, &format!("create:{resource}:{salt}"));
    let stem: String = resource.chars().take(3).collect();
    let body = json!({
        "id": format!("{stem}_{token}"),
        "status": "created",
        "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });

    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    apply_rate_limit_headers(&mut response);
    response.extensions_mut().insert(TrapMeta::new(
        TrapType::RestApi,
        state.persona.endpoint("/{resource}"),
    ));
    response
}

// ─── OpenAPI ────────────────────────────────────────────────────────────────

async fn swagger_docs(State(state): State<AppState>) -> Response {
    let spec = build_openapi_spec(&state.persona);
    let mut response = (StatusCode::OK, Json(spec)).into_response();
    apply_rate_limit_headers(&mut response);
    response
        .extensions_mut()
        .insert(TrapMeta::new(TrapType::RestApi, docs_path(&state.persona)));
    response
}

/// Complete OpenAPI 3.0.3 document for the persona: per-industry
/// operations, an auth-token operation, and security schemes derived from
/// the persona's auth scheme.
pub fn build_openapi_spec(persona: &Persona) -> Value {
    let domain = persona.company_domain();
    let namespace: String = persona
        .company_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let mut paths = serde_json::Map::new();

    for (path, method, summary) in packs::rest_operations(persona.industry) {
        let full_path = persona.endpoint(path);
        let operation_id = format!(
            "{namespace}_{}",
            path.trim_matches('/')
                .replace('/', "_")
                .replace(['{', '}'], "")
        );
        let operation = json!({
            "summary": summary,
            "operationId": operation_id,
            "responses": {
                "200": {"description": "Successful response"},
                "401": {"description": "Unauthorized"},
                "404": {"description": "Not found"},
            },
        });
        paths
            .entry(full_path)
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .expect("path entry is an object")
            .insert(method.to_lowercase(), operation);
    }

    let auth_path = persona.endpoint("/auth/token");
    paths.insert(
        auth_path.clone(),
        json!({
            "post": {
                "summary": "Authenticate and obtain access token",
                "operationId": format!("{namespace}_auth_token"),
                "responses": {
                    "200": {"description": "Authentication successful"},
                    "401": {"description": "Invalid credentials"},
                },
            },
        }),
    );

    let (security_schemes, security) = match persona.auth_scheme {
        AuthScheme::Bearer => (
            json!({"bearerAuth": {"type": "http", "scheme": "bearer"}}),
            json!([{"bearerAuth": []}]),
        ),
        AuthScheme::ApiKeyHeader | AuthScheme::ApiKeyQuery => (
            json!({"apiKeyAuth": {"type": "apiKey", "in": "header", "name": "X-API-Key"}}),
            json!([{"apiKeyAuth": []}]),
        ),
        AuthScheme::Oauth2 => (
            json!({
                "oauth2": {
                    "type": "oauth2",
                    "flows": {
                        "clientCredentials": {
                            "tokenUrl": auth_path,
                            "scopes": {"read": "Read access", "write": "Write access"},
                        },
                    },
                }
            }),
            json!([{"oauth2": ["read", "write"]}]),
        ),
        AuthScheme::Basic => (
            json!({"basicAuth": {"type": "http", "scheme": "basic"}}),
            json!([{"basicAuth": []}]),
        ),
    };

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": format!("{} API", persona.company_name),
            "version": "1.0.0",
            "description": format!(
                "Internal API for {} {} service.",
                persona.company_name, persona.data_theme
            ),
            "contact": {"email": format!("api-support@{domain}")},
        },
        "servers": [{"url": format!("https://api.{domain}")}],
        "paths": Value::Object(paths),
        "security": security,
        "components": {"securitySchemes": security_schemes},
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::generator::generate;

    #[test]
    fn docs_path_follows_framework() {
        let mut persona = generate(Some(42));
        for (framework, expected) in [
            ("express/4.18.2", "/api-docs"),
            ("nestjs/10.3.0", "/api-docs"),
            ("django/4.2", "/docs"),
            ("fastapi/0.109.0", "/docs"),
            ("rails/7.1", "/api/docs"),
            ("spring-boot/3.2.0", "/swagger-ui.html"),
            ("laravel/10.40", "/api/documentation"),
            ("gin/1.9.1", "/docs"),
        ] {
            persona.framework_fingerprint = framework.into();
            assert_eq!(docs_path(&persona), expected, "{framework}");
        }
    }

    #[test]
    fn list_query_clamps_out_of_range_values() {
        let q = ListQuery {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(q.normalized(), (1, 25));

        let q = ListQuery {
            page: Some(3),
            per_page: Some(50),
        };
        assert_eq!(q.normalized(), (3, 50));

        let q = ListQuery {
            page: None,
            per_page: None,
        };
        assert_eq!(q.normalized(), (1, 25));
    }

    #[test]
    fn openapi_spec_lists_industry_operations_and_auth() {
        let persona = generate(Some(42));
        let spec = build_openapi_spec(&persona);
        assert_eq!(spec["openapi"], "3.0.3");
        assert_eq!(
            spec["info"]["title"],
            format!("{} API", persona.company_name)
        );

        let paths = spec["paths"].as_object().unwrap();
        assert!(paths.contains_key(&persona.endpoint("/auth/token")));
        // All advertised paths live under the persona's prefix.
        for path in paths.keys() {
            assert!(path.starts_with(&persona.endpoint_prefix), "{path}");
        }
        assert!(paths.len() > 5);
    }

    #[test]
    fn openapi_security_scheme_tracks_persona() {
        let mut persona = generate(Some(42));

        persona.auth_scheme = AuthScheme::Bearer;
        let spec = build_openapi_spec(&persona);
        assert!(spec["components"]["securitySchemes"]["bearerAuth"].is_object());

        persona.auth_scheme = AuthScheme::Oauth2;
        let spec = build_openapi_spec(&persona);
        assert_eq!(
            spec["components"]["securitySchemes"]["oauth2"]["flows"]["clientCredentials"]
                ["tokenUrl"],
            persona.endpoint("/auth/token")
        );

        persona.auth_scheme = AuthScheme::ApiKeyHeader;
        let spec = build_openapi_spec(&persona);
        assert_eq!(
            spec["components"]["securitySchemes"]["apiKeyAuth"]["name"],
            "X-API-Key"
        );
    }

    #[test]
    fn openapi_server_uses_reserved_domain() {
        let persona = generate(Some(99));
        let spec = build_openapi_spec(&persona);
        let server = spec["servers"][0]["url"].as_str().unwrap();
        assert!(server.ends_with(".example.com"));
    }
}
