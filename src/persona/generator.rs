//! Deterministic persona generation.
//!
//! Every draw comes from a single seeded `StdRng` stream in a fixed order,
//! so the same seed always yields a byte-identical persona while distinct
//! seeds produce uncorrelated deployments.

use crate::error::ConfigError;
use crate::models::{AuthScheme, ErrorStyle, Industry, Persona};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::Path;

const COMPANY_PREFIXES: [&str; 22] = [
    "Nova", "Apex", "Cirrus", "Vortex", "Helix", "Prism", "Nexus", "Vertex", "Stratos", "Cipher",
    "Pulse", "Quantum", "Atlas", "Zenith", "Flux", "Ember", "Cobalt", "Nimbus", "Drift", "Forge",
    "Lumen", "Crest",
];

const COMPANY_SUFFIXES: [&str; 20] = [
    "Systems", "Labs", "AI", "Cloud", "Data", "Tech", "Platform", "IO", "Solutions", "Analytics",
    "Works", "Logic", "Base", "Hub", "Core", "Stack", "Flow", "Net", "API", "Ops",
];

const API_STYLES: [&str; 3] = ["rest", "graphql", "jsonrpc"];

const FRAMEWORKS: [&str; 10] = [
    "express/4.18.2",
    "django/4.2",
    "rails/7.1",
    "spring-boot/3.2.0",
    "fastapi/0.109.0",
    "flask/3.0.0",
    "nestjs/10.3.0",
    "gin/1.9.1",
    "laravel/10.40",
    "actix-web/4.4",
];

const SERVER_HEADERS: [&str; 8] = [
    "nginx/1.24.0",
    "nginx/1.25.3",
    "Apache/2.4.58",
    "cloudflare",
    "AmazonS3",
    "gws",
    "Microsoft-IIS/10.0",
    "openresty/1.25.3.1",
];

const ENDPOINT_PREFIXES: [&str; 8] = [
    "/api/v1",
    "/api/v2",
    "/api/v3",
    "/v1",
    "/v2",
    "/rest/v1",
    "/api",
    "/service/api",
];

const MCP_SERVER_NAMES: [&str; 8] = [
    "data-api",
    "platform-api",
    "core-service",
    "main-api",
    "backend",
    "service-hub",
    "api-gateway",
    "data-service",
];

/// Domain-specific collection names per industry; the first draw becomes
/// the persona's data theme.
pub fn data_themes(industry: Industry) -> &'static [&'static str] {
    match industry {
        Industry::Fintech => &["payments", "transactions", "accounts", "transfers", "invoices"],
        Industry::Saas => &["users", "workspaces", "subscriptions", "integrations", "webhooks"],
        Industry::Healthcare => &[
            "patients",
            "appointments",
            "records",
            "prescriptions",
            "providers",
        ],
        Industry::Ecommerce => &["products", "orders", "carts", "inventory", "reviews"],
        Industry::Devtools => &["repositories", "builds", "deployments", "pipelines", "artifacts"],
        Industry::Logistics => &["shipments", "warehouses", "routes", "tracking", "carriers"],
    }
}

fn tool_prefixes(industry: Industry) -> &'static [&'static str] {
    match industry {
        Industry::Fintech => &["payment_", "txn_", "account_", "finance_"],
        Industry::Saas => &["workspace_", "user_", "tenant_", "app_"],
        Industry::Healthcare => &["patient_", "clinical_", "health_", "medical_"],
        Industry::Ecommerce => &["product_", "order_", "catalog_", "shop_"],
        Industry::Devtools => &["repo_", "build_", "deploy_", "pipeline_"],
        Industry::Logistics => &["shipment_", "route_", "warehouse_", "tracking_"],
    }
}

fn pick<'a, T: Copy>(rng: &mut StdRng, items: &'a [T]) -> T {
    items[rng.random_range(0..items.len())]
}

/// Generate a random but internally consistent persona. A `None` seed draws
/// one from the thread RNG first, so the result is still reproducible from
/// the recorded seed.
pub fn generate(seed: Option<u64>) -> Persona {
    let seed = seed.unwrap_or_else(|| u64::from(rand::rng().random::<u32>()));
    let mut rng = StdRng::seed_from_u64(seed);

    let industry = pick(&mut rng, &Industry::ALL);
    let company_name = format!(
        "{}{}",
        pick(&mut rng, &COMPANY_PREFIXES),
        pick(&mut rng, &COMPANY_SUFFIXES)
    );
    let data_theme = pick(&mut rng, data_themes(industry)).to_string();
    let endpoint_prefix = pick(&mut rng, &ENDPOINT_PREFIXES).to_string();
    let api_style = pick(&mut rng, &API_STYLES).to_string();
    let framework_fingerprint = pick(&mut rng, &FRAMEWORKS).to_string();
    let error_style = pick(&mut rng, &ErrorStyle::ALL);
    let auth_scheme = pick(&mut rng, &AuthScheme::ALL);
    let server_header = pick(&mut rng, &SERVER_HEADERS).to_string();
    let response_latency_ms = rng.random_range(20..=300u64);
    let mcp_server_name = pick(&mut rng, &MCP_SERVER_NAMES).to_string();
    let mcp_tool_prefix = pick(&mut rng, tool_prefixes(industry)).to_string();
    let extra_headers = generate_extra_headers(&mut rng);

    Persona {
        seed,
        company_name,
        industry,
        api_style,
        framework_fingerprint,
        error_style,
        auth_scheme,
        data_theme,
        response_latency_ms: response_latency_ms.clamp(10, 2000),
        server_header,
        endpoint_prefix,
        extra_headers,
        mcp_server_name,
        mcp_tool_prefix,
    }
}

fn generate_extra_headers(rng: &mut StdRng) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    if rng.random::<f64>() < 0.6 {
        headers.insert("X-Request-Id".to_string(), "{{request_id}}".to_string());
    }
    if rng.random::<f64>() < 0.4 {
        let limit = pick(rng, &[100u32, 500, 1000, 5000]);
        headers.insert("X-RateLimit-Limit".to_string(), limit.to_string());
    }
    if rng.random::<f64>() < 0.3 {
        let powered = pick(rng, &["Express", "Django", "Rails", "Spring"]);
        headers.insert("X-Powered-By".to_string(), powered.to_string());
    }
    if rng.random::<f64>() < 0.5 {
        headers.insert(
            "X-Response-Time".to_string(),
            "{{response_time_ms}}ms".to_string(),
        );
    }

    headers
}

/// Load a persisted persona for deployment stability.
pub fn load_persona(path: &Path) -> Result<Persona, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Load(format!(
            "persona file not found: {}",
            path.display()
        )));
    }
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Persist a persona so redeployments keep the same identity.
pub fn save_persona(persona: &Persona, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw =
        toml::to_string_pretty(persona).map_err(|e| ConfigError::Validation(e.to_string()))?;
    std::fs::write(path, raw)?;
    Ok(())
}
