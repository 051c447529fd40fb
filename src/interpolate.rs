//! Runtime `{{name}}` placeholder rendering for response templates.
//!
//! Templates are generated once at deployment time; at request time only
//! this substitution runs, so serving stays cheap and deterministic in
//! shape. Unknown placeholders are left literal.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"));

/// Replace `{{name}}` placeholders in a template string.
///
/// Built-in variables, minted fresh per call:
/// - `{{timestamp}}` — current UTC ISO 8601
/// - `{{request_id}}`, `{{random_id}}` — 128-bit hex
/// - `{{random_int}}` — uniform in `[1000, 999999]`
/// - `{{response_time_ms}}` — uniform in `[1, 50]`
///
/// Caller-supplied context entries override the built-ins.
pub fn render(template: &str, context: Option<&BTreeMap<String, String>>) -> String {
    let mut vars = builtin_vars();
    if let Some(extra) = context {
        for (k, v) in extra {
            vars.insert(k.clone(), v.clone());
        }
    }
    substitute(template, &vars)
}

/// Recursively render every string inside a JSON value with an explicit
/// variable map. Used by the trap tables, whose bodies are structured
/// values rather than flat strings.
pub fn render_value(value: &serde_json::Value, vars: &BTreeMap<String, String>) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(substitute(s, vars)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| render_value(v, vars)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn builtin_vars() -> BTreeMap<String, String> {
    let mut rng = rand::rng();
    BTreeMap::from([
        (
            "timestamp".to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("request_id".to_string(), Uuid::new_v4().simple().to_string()),
        ("random_id".to_string(), Uuid::new_v4().simple().to_string()),
        (
            "random_int".to_string(),
            rng.random_range(1000..=999_999u32).to_string(),
        ),
        (
            "response_time_ms".to_string(),
            rng.random_range(1..=50u32).to_string(),
        ),
    ])
}

fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
