//! Core data model: personas, response templates, captured events, sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ─── Classification ─────────────────────────────────────────────────────────

/// Four-tier label assigned to an event or session by the classifier.
/// `Unknown` is the initial value before the first scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    Unknown,
    Human,
    Automated,
    AiAssisted,
    AiAgent,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Human => "human",
            Self::Automated => "automated",
            Self::AiAssisted => "ai_assisted",
            Self::AiAgent => "ai_agent",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "human" => Self::Human,
            "automated" => Self::Automated,
            "ai_assisted" => Self::AiAssisted,
            "ai_agent" => Self::AiAgent,
            _ => Self::Unknown,
        }
    }
}

// ─── Persona vocabulary ─────────────────────────────────────────────────────

/// Industry vertical. Determines the template pack, the MCP tool family,
/// and the industry-specific discovery paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Fintech,
    Saas,
    Healthcare,
    Ecommerce,
    Devtools,
    Logistics,
}

impl Industry {
    pub const ALL: [Industry; 6] = [
        Self::Fintech,
        Self::Saas,
        Self::Healthcare,
        Self::Ecommerce,
        Self::Devtools,
        Self::Logistics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fintech => "fintech",
            Self::Saas => "saas",
            Self::Healthcare => "healthcare",
            Self::Ecommerce => "ecommerce",
            Self::Devtools => "devtools",
            Self::Logistics => "logistics",
        }
    }
}

/// Authentication scheme the persona pretends to enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    Bearer,
    ApiKeyHeader,
    ApiKeyQuery,
    Basic,
    Oauth2,
}

impl AuthScheme {
    pub const ALL: [AuthScheme; 5] = [
        Self::Bearer,
        Self::ApiKeyHeader,
        Self::ApiKeyQuery,
        Self::Basic,
        Self::Oauth2,
    ];
}

/// Error body format for the persona's 4xx/5xx responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStyle {
    Rfc7807,
    SimpleJson,
    Html,
    Xml,
}

impl ErrorStyle {
    pub const ALL: [ErrorStyle; 4] = [Self::Rfc7807, Self::SimpleJson, Self::Html, Self::Xml];
}

/// Which trap surface handled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapType {
    RestApi,
    Mcp,
    Discovery,
    Unmatched,
}

impl TrapType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RestApi => "rest_api",
            Self::Mcp => "mcp",
            Self::Discovery => "discovery",
            Self::Unmatched => "unmatched",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rest_api" => Some(Self::RestApi),
            "mcp" => Some(Self::Mcp),
            "discovery" => Some(Self::Discovery),
            "unmatched" => Some(Self::Unmatched),
            _ => None,
        }
    }
}

// ─── Persona ────────────────────────────────────────────────────────────────

/// A unique deployment identity that shapes every byte the service emits:
/// endpoint paths, response bodies, error formats, headers, timing, and MCP
/// tool names. Identical seed ⇒ identical persona, so deployments are
/// reproducible while remaining mutually uncorrelated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub seed: u64,
    pub company_name: String,
    pub industry: Industry,
    pub api_style: String,
    /// Simulated framework identity as `name/version`, e.g. `express/4.18.2`.
    pub framework_fingerprint: String,
    pub error_style: ErrorStyle,
    pub auth_scheme: AuthScheme,
    pub data_theme: String,
    /// Base artificial latency in milliseconds, within `[10, 2000]`.
    pub response_latency_ms: u64,
    pub server_header: String,
    /// URL prefix for all REST trap endpoints. Leading `/`, no trailing `/`.
    pub endpoint_prefix: String,
    /// Extra response headers; values may contain `{{..}}` placeholders.
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
    pub mcp_server_name: String,
    pub mcp_tool_prefix: String,
}

impl Persona {
    /// Join a relative path onto the persona's endpoint prefix.
    pub fn endpoint(&self, path: &str) -> String {
        let prefix = self.endpoint_prefix.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{prefix}{path}")
        } else {
            format!("{prefix}/{path}")
        }
    }

    /// Plausible reserved-range domain derived from the company name.
    pub fn company_domain(&self) -> String {
        let flat: String = self
            .company_name
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        format!("{flat}.example.com")
    }
}

// ─── Fingerprint scores ─────────────────────────────────────────────────────

/// Signal scores produced by the fingerprinting pipeline. Each is in
/// `[0, 1]`; `composite` is the fixed weighted sum of the other five,
/// clamped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FingerprintScores {
    #[serde(default)]
    pub timing_regularity: f64,
    #[serde(default)]
    pub path_enumeration: f64,
    #[serde(default)]
    pub header_anomaly: f64,
    #[serde(default)]
    pub prompt_leakage: f64,
    #[serde(default)]
    pub mcp_behavior: f64,
    #[serde(default)]
    pub composite: f64,
}

impl FingerprintScores {
    /// Name of the strongest individual signal (`composite` excluded).
    pub fn dominant_signal(&self) -> &'static str {
        let signals = [
            ("timing_regularity", self.timing_regularity),
            ("path_enumeration", self.path_enumeration),
            ("header_anomaly", self.header_anomaly),
            ("prompt_leakage", self.prompt_leakage),
            ("mcp_behavior", self.mcp_behavior),
        ];
        signals
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| *name)
            .unwrap_or("none")
    }
}

// ─── Response templates ─────────────────────────────────────────────────────

/// A cached response shape for one `(method, endpoint)` pair. The endpoint
/// may contain `{{name}}` segments, each matching exactly one path
/// component. Bodies and header values are rendered through the
/// interpolator at request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTemplate {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_status")]
    pub status_code: u16,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body_template: String,
    #[serde(default)]
    pub description: String,
}

fn default_method() -> String {
    "GET".into()
}

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "application/json".into()
}

// ─── Captured events ────────────────────────────────────────────────────────

/// One captured inbound request, with the fingerprint analysis attached
/// after the response is served. Immutable once emitted, except for
/// analyst-supplied `notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub source_ip: String,
    pub source_port: Option<u16>,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
    /// Header names lowercased at capture time.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub body_json: Option<serde_json::Value>,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub fingerprint_scores: FingerprintScores,
    #[serde(default)]
    pub classification: Classification,
    pub trap_type: Option<TrapType>,
    pub matched_endpoint: Option<String>,
    pub response_status: Option<u16>,
    pub notes: Option<String>,
}

impl RequestEvent {
    /// A fresh event for a request just observed by the capture middleware.
    pub fn new(source_ip: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now(),
            session_id: None,
            source_ip: source_ip.into(),
            source_port: None,
            method: method.into(),
            path: path.into(),
            query_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            body_json: None,
            content_type: None,
            user_agent: None,
            fingerprint_scores: FingerprintScores::default(),
            classification: Classification::Unknown,
            trap_type: None,
            matched_endpoint: None,
            response_status: None,
            notes: None,
        }
    }
}

// ─── Sessions ───────────────────────────────────────────────────────────────

/// Requests from one source IP grouped by temporal proximity. Holds the
/// rolling aggregate the scorer re-reads on every event. Sessions hold
/// ordered event ids; events carry the session id; storage owns both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub source_ip: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub request_count: u64,
    /// Ordered event ids, in lock-acquisition order.
    #[serde(default)]
    pub request_ids: Vec<String>,
    #[serde(default)]
    pub classification: Classification,
    /// Last-event aggregate scores.
    #[serde(default)]
    pub fingerprint_scores: FingerprintScores,
    /// Unique endpoints in first-hit order.
    #[serde(default)]
    pub endpoints_hit: Vec<String>,
    /// Set semantics, insertion order preserved.
    #[serde(default)]
    pub trap_types_triggered: Vec<TrapType>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

impl Session {
    pub fn new(source_ip: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            source_ip: source_ip.into(),
            first_seen: now,
            last_seen: now,
            request_count: 0,
            request_ids: Vec::new(),
            classification: Classification::Unknown,
            fingerprint_scores: FingerprintScores::default(),
            endpoints_hit: Vec::new(),
            trap_types_triggered: Vec::new(),
            tags: Vec::new(),
            notes: None,
        }
    }
}
