#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

// ── Foundation ───────────────────────────────────────────────────────────────
pub mod canary;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod models;

// ── Analysis pipeline ────────────────────────────────────────────────────────
pub mod classify;
pub mod fingerprint;
pub mod sessions;

// ── Identity + templates ─────────────────────────────────────────────────────
pub mod persona;
pub mod providers;

// ── Serving ──────────────────────────────────────────────────────────────────
pub mod server;
pub mod storage;
pub mod traps;

// ── Re-exports ───────────────────────────────────────────────────────────────
pub use config::Config;
pub use error::{FeintError, Result};
pub use models::{Classification, Persona, RequestEvent, Session};
