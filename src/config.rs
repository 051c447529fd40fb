//! Configuration loading and validation.
//!
//! The config surface is a fixed record; unrecognized keys are a startup
//! error rather than silently ignored options.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ─── Top-level config ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub traps: TrapsConfig,

    /// Persona source: `"auto"` to generate a random persona, or a path to
    /// a persisted persona file for deployment stability.
    #[serde(default = "default_persona")]
    pub persona: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_persona() -> String {
    "auto".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            traps: TrapsConfig::default(),
            persona: default_persona(),
            llm: LlmConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─── Server ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request deadline in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// ─── Trap toggles ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrapsConfig {
    #[serde(default = "default_true")]
    pub mcp_server: bool,
    #[serde(default = "default_true")]
    pub rest_api: bool,
    #[serde(default = "default_true")]
    pub ai_discovery: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TrapsConfig {
    fn default() -> Self {
        Self {
            mcp_server: true,
            rest_api: true,
            ai_discovery: true,
        }
    }
}

// ─── LLM provider ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// `none`, `ollama`, `anthropic`, or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Falls back to the provider's environment variable when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "none".into()
}

fn default_model() -> String {
    "llama3".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ─── Storage ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: String,
    /// JSON-Lines mirror of every saved event; empty disables it.
    #[serde(default = "default_log_file")]
    pub log_file: Option<String>,
}

fn default_database() -> String {
    "./data/feint.db".into()
}

fn default_log_file() -> Option<String> {
    Some("./data/events.jsonl".into())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            log_file: default_log_file(),
        }
    }
}

// ─── Logging ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

// ─── Loading ──────────────────────────────────────────────────────────────

impl Config {
    /// Load configuration from a TOML file; a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new("feint.toml"));

        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on invalid values rather than surfacing them mid-request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.llm.provider.as_str() {
            "none" | "ollama" | "anthropic" | "openai" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "unknown llm provider '{other}' (expected none, ollama, anthropic, or openai)"
                )));
            }
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Validation(format!(
                "llm.temperature must be within [0.0, 2.0], got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "llm.max_tokens must be at least 1".into(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.storage.database.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.database must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Directory holding the database, template cache, and event log.
    pub fn data_dir(&self) -> std::path::PathBuf {
        Path::new(&self.storage.database)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| std::path::PathBuf::from("./data"))
    }
}
