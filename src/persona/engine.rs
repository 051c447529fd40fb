//! Response-template cache: generation, persistence, and lookup.
//!
//! Templates are produced once at deployment time, by an LLM provider when
//! one is configured and from the built-in industry packs otherwise, then
//! cached to disk and served read-only. Provider failures never surface to
//! callers; they degrade to packs, and a missing or malformed pack degrades
//! to a minimal built-in set, so the traps never 503.

use crate::config::LlmConfig;
use crate::error::EngineError;
use crate::models::{Persona, ResponseTemplate};
use crate::persona::packs;
use crate::providers::{self, TemplateProvider};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TEMPLATE_CACHE_FILE: &str = "template_cache.json";

const GENERATION_SYSTEM_PROMPT: &str = "You are a response template generator for a realistic \
internal API simulation. Given a company profile, generate realistic API response templates \
that look like a real production API. Templates use {{variable}} placeholders for dynamic \
values.\n\nAvailable placeholders:\n- {{timestamp}} — current ISO 8601 timestamp\n- \
{{request_id}} — unique request ID\n- {{random_id}} — random UUID\n- {{random_int}} — random \
integer\n- {{source_ip}} — requester's IP\n\nRespond with valid JSON only. No markdown, no \
explanation.";

/// Owns the template cache for one deployment persona.
///
/// Built once at startup, read-only afterwards; handlers share it behind an
/// `Arc` without further locking.
pub struct PersonaEngine {
    persona: Persona,
    cache_path: PathBuf,
    templates: BTreeMap<String, ResponseTemplate>,
}

impl PersonaEngine {
    /// Build the engine: load the durable cache if present (and no force
    /// flag), otherwise generate per the configured provider and persist.
    pub async fn initialize(
        persona: Persona,
        llm: &LlmConfig,
        data_dir: &Path,
        force_regenerate: bool,
    ) -> Self {
        let cache_path = data_dir.join(TEMPLATE_CACHE_FILE);
        let mut engine = Self {
            persona,
            cache_path,
            templates: BTreeMap::new(),
        };

        if !force_regenerate && engine.load_from_cache().await {
            info!(
                count = engine.templates.len(),
                company = %engine.persona.company_name,
                "loaded response templates from cache"
            );
            return engine;
        }

        match llm.provider.as_str() {
            "none" => engine.load_from_packs(),
            "ollama" | "anthropic" | "openai" => engine.generate_with_provider(llm).await,
            other => {
                warn!(provider = other, "unknown template provider, using packs");
                engine.load_from_packs();
            }
        }

        if let Err(err) = engine.persist_cache().await {
            warn!(error = %err, "failed to persist template cache");
        }
        info!(
            count = engine.templates.len(),
            company = %engine.persona.company_name,
            "generated response templates"
        );
        engine
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// Resolve a template for `(method, path)`. Exact key first, then
    /// pattern matching where a `{{var}}` segment matches one path
    /// component; the most specific pattern (fewest wildcards) wins, ties
    /// broken toward the lexicographically greatest pattern so literal
    /// text beats placeholders deterministically.
    pub fn get_template(&self, method: &str, path: &str) -> Option<&ResponseTemplate> {
        let key = template_key(method, path);
        if let Some(template) = self.templates.get(&key) {
            return Some(template);
        }

        self.templates
            .values()
            .filter(|t| t.method.eq_ignore_ascii_case(method))
            .filter(|t| path_matches(path, &t.endpoint))
            .min_by(|a, b| {
                wildcard_count(&a.endpoint)
                    .cmp(&wildcard_count(&b.endpoint))
                    .then(b.endpoint.cmp(&a.endpoint))
            })
    }

    pub fn all_templates(&self) -> impl Iterator<Item = &ResponseTemplate> {
        self.templates.values()
    }

    /// Register a template, rewriting any generic pack prefix onto the
    /// persona's endpoint prefix and fixing the company-name placeholder.
    pub fn register_template(&mut self, template: ResponseTemplate) {
        let adjusted = self.adjust_to_persona(template);
        let key = template_key(&adjusted.method, &adjusted.endpoint);
        self.templates.insert(key, adjusted);
    }

    fn adjust_to_persona(&self, template: ResponseTemplate) -> ResponseTemplate {
        let prefix = self.persona.endpoint_prefix.trim_end_matches('/');
        let mut endpoint = template.endpoint;

        for generic in ["/api/v1", "/api/v2", "/v1", "/api"] {
            if let Some(rest) = endpoint.strip_prefix(generic) {
                if rest.is_empty() || rest.starts_with('/') {
                    endpoint = format!("{prefix}{rest}");
                    break;
                }
            }
        }
        if !endpoint.starts_with(prefix) && !endpoint.starts_with("/.well-known") {
            endpoint = format!("{prefix}{endpoint}");
        }

        let body = template
            .body_template
            .replace("{{company_name}}", &self.persona.company_name);

        let mut headers = template.headers;
        for (k, v) in &self.persona.extra_headers {
            headers.entry(k.clone()).or_insert_with(|| v.clone());
        }

        ResponseTemplate {
            endpoint,
            method: template.method,
            status_code: template.status_code,
            content_type: template.content_type,
            headers,
            body_template: body,
            description: template.description,
        }
    }

    // ── Cache persistence ────────────────────────────────────

    async fn load_from_cache(&mut self) -> bool {
        let raw = match tokio::fs::read_to_string(&self.cache_path).await {
            Ok(raw) => raw,
            Err(_) => return false,
        };

        match serde_json::from_str::<Vec<ResponseTemplate>>(&raw) {
            Ok(items) => {
                for template in items {
                    // Cached entries were adjusted before persisting; keep
                    // them verbatim so prefixes stay stable across restarts.
                    let key = template_key(&template.method, &template.endpoint);
                    self.templates.insert(key, template);
                }
                !self.templates.is_empty()
            }
            Err(err) => {
                warn!(error = %err, "template cache unreadable, regenerating");
                false
            }
        }
    }

    async fn persist_cache(&self) -> Result<(), EngineError> {
        let items: Vec<&ResponseTemplate> = self.templates.values().collect();
        let raw = serde_json::to_string_pretty(&items)
            .map_err(|e| EngineError::Cache(e.to_string()))?;

        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::Cache(e.to_string()))?;
        }
        tokio::fs::write(&self.cache_path, raw)
            .await
            .map_err(|e| EngineError::Cache(e.to_string()))
    }

    // ── Pack + default fallbacks ─────────────────────────────

    fn load_from_packs(&mut self) {
        let pack = packs::pack_templates(self.persona.industry);
        if pack.is_empty() {
            warn!(
                industry = self.persona.industry.as_str(),
                "industry pack empty, generating minimal defaults"
            );
            self.generate_minimal_defaults();
            return;
        }
        for template in pack {
            self.register_template(template);
        }
    }

    /// Smallest viable endpoint set: list, detail, create, health.
    fn generate_minimal_defaults(&mut self) {
        let prefix = self.persona.endpoint_prefix.trim_end_matches('/').to_string();
        let theme = self.persona.data_theme.clone();

        let defaults = [
            ResponseTemplate {
                endpoint: format!("{prefix}/{theme}"),
                method: "GET".into(),
                status_code: 200,
                content_type: "application/json".into(),
                headers: BTreeMap::new(),
                body_template: json!({
                    "data": [],
                    "meta": {"total": 0, "page": 1, "per_page": 20},
                    "request_id": "{{request_id}}"
                })
                .to_string(),
                description: format!("List {theme}"),
            },
            ResponseTemplate {
                endpoint: format!("{prefix}/{theme}/{{{{id}}}}"),
                method: "GET".into(),
                status_code: 200,
                content_type: "application/json".into(),
                headers: BTreeMap::new(),
                body_template: json!({
                    "id": "{{random_id}}",
                    "created_at": "{{timestamp}}",
                    "updated_at": "{{timestamp}}"
                })
                .to_string(),
                description: format!("Get single {theme} item"),
            },
            ResponseTemplate {
                endpoint: format!("{prefix}/{theme}"),
                method: "POST".into(),
                status_code: 201,
                content_type: "application/json".into(),
                headers: BTreeMap::new(),
                body_template: json!({
                    "id": "{{random_id}}",
                    "created_at": "{{timestamp}}",
                    "status": "created"
                })
                .to_string(),
                description: format!("Create {theme} item"),
            },
            ResponseTemplate {
                endpoint: format!("{prefix}/health"),
                method: "GET".into(),
                status_code: 200,
                content_type: "application/json".into(),
                headers: BTreeMap::new(),
                body_template: json!({
                    "status": "healthy",
                    "timestamp": "{{timestamp}}",
                    "version": "1.0.0"
                })
                .to_string(),
                description: "Health check endpoint".into(),
            },
        ];

        for template in defaults {
            self.register_template(template);
        }
    }

    // ── Provider generation ──────────────────────────────────

    async fn generate_with_provider(&mut self, llm: &LlmConfig) {
        let provider = providers::create_provider(llm);
        let prompt = build_generation_prompt(&self.persona);

        match provider.generate(GENERATION_SYSTEM_PROMPT, &prompt).await {
            Ok(text) => {
                if let Err(err) = self.ingest_provider_response(&text) {
                    warn!(
                        provider = provider.name(),
                        error = %err,
                        "template generation unusable, falling back to packs"
                    );
                    self.load_from_packs();
                }
            }
            Err(err) => {
                warn!(
                    provider = provider.name(),
                    error = %err,
                    "template generation failed, falling back to packs"
                );
                self.load_from_packs();
            }
        }
    }

    fn ingest_provider_response(&mut self, text: &str) -> Result<(), EngineError> {
        let text = text.trim();
        let cleaned = if text.starts_with("```") {
            let lines: Vec<&str> = text.lines().collect();
            lines[1..lines.len().saturating_sub(1)].join("\n")
        } else {
            text.to_string()
        };

        let items: Vec<ResponseTemplate> =
            serde_json::from_str(&cleaned).map_err(|e| EngineError::Parse(e.to_string()))?;
        if items.is_empty() {
            return Err(EngineError::Parse("provider returned no templates".into()));
        }

        for template in items {
            if template.endpoint.is_empty() || template.body_template.is_empty() {
                return Err(EngineError::Parse(
                    "template missing endpoint or body".into(),
                ));
            }
            self.register_template(template);
        }
        Ok(())
    }
}

fn template_key(method: &str, endpoint: &str) -> String {
    format!("{}:{}", method.to_uppercase(), endpoint)
}

fn wildcard_count(pattern: &str) -> usize {
    pattern
        .split('/')
        .filter(|seg| seg.starts_with("{{") && seg.ends_with("}}"))
        .count()
}

/// A `{{var}}` segment matches any single path component; everything else
/// must match literally, and segment counts must agree.
fn path_matches(request_path: &str, pattern: &str) -> bool {
    let req: Vec<&str> = request_path.trim_matches('/').split('/').collect();
    let pat: Vec<&str> = pattern.trim_matches('/').split('/').collect();

    if req.len() != pat.len() {
        return false;
    }

    req.iter().zip(pat.iter()).all(|(r, p)| {
        (p.starts_with("{{") && p.ends_with("}}")) || r == p
    })
}

fn build_generation_prompt(persona: &Persona) -> String {
    format!(
        "Generate realistic API response templates for this company:\n\n\
         Company: {company}\n\
         Industry: {industry}\n\
         API Style: {api_style}\n\
         Data Theme: {theme}\n\
         Endpoint Prefix: {prefix}\n\
         Error Style: {error_style}\n\n\
         Generate a JSON array of response templates. Each template should have:\n\
         - endpoint: path with the given prefix\n\
         - method: HTTP method (GET, POST, PUT, DELETE)\n\
         - status_code: appropriate HTTP status\n\
         - content_type: \"application/json\"\n\
         - headers: object of extra headers\n\
         - body_template: realistic JSON response body using {{{{timestamp}}}}, \
         {{{{request_id}}}}, {{{{random_id}}}}, {{{{random_int}}}} placeholders\n\
         - description: what this endpoint does\n\n\
         Generate at least 8 endpoints covering:\n\
         1. List collection (GET {prefix}/{theme})\n\
         2. Get single item (GET {prefix}/{theme}/{{{{id}}}})\n\
         3. Create item (POST)\n\
         4. Update item (PUT)\n\
         5. Delete item (DELETE)\n\
         6. Health check\n\
         7. API documentation endpoint\n\
         8. Auth token endpoint\n",
        company = persona.company_name,
        industry = persona.industry.as_str(),
        api_style = persona.api_style,
        theme = persona.data_theme,
        prefix = persona.endpoint_prefix,
        error_style = serde_json::to_string(&persona.error_style).unwrap_or_default(),
    )
}
