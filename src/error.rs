use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Feint.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal wiring code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum FeintError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Classification ──────────────────────────────────────────────────
    #[error("classify: {0}")]
    Classify(#[from] ClassifyError),

    // ── Storage ─────────────────────────────────────────────────────────
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    // ── Persona / template engine ───────────────────────────────────────
    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

/// Configuration faults fail fast at startup; nothing here is recoverable
/// at request time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Classification errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("composite score must be within [0.0, 1.0], got {0}")]
    OutOfRange(f64),
}

// ─── Storage errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("open failed: {0}")]
    Open(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("row decode failed: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}

// ─── Persona engine errors ──────────────────────────────────────────────────

/// Engine faults are degradation-class: callers log them and fall back to
/// packs or built-in defaults, they never reach the wire.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("template cache: {0}")]
    Cache(String),

    #[error("provider {provider} generation failed: {message}")]
    Generation { provider: String, message: String },

    #[error("invalid template payload: {0}")]
    Parse(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, FeintError>;
