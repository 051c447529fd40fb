//! Behavioral fingerprinting: five signal scorers and a weighted composite.
//!
//! Each signal maps observed request behavior to `[0.0, 1.0]`, where 0 reads
//! as human and 1 as an autonomous agent. Weights and thresholds are part of
//! the externally observable contract and must not drift.

use crate::models::FingerprintScores;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::LazyLock;

// ─── Composite weights ──────────────────────────────────────────────────────

pub const W_TIMING: f64 = 0.15;
pub const W_PATH: f64 = 0.20;
pub const W_HEADER: f64 = 0.20;
pub const W_PROMPT: f64 = 0.20;
pub const W_MCP: f64 = 0.25;

// ─── Signal 1: timing regularity ────────────────────────────────────────────

/// Score how metronomic the inter-request intervals are. Humans have wide
/// variance; agents and scanners fire on near-constant cadence.
pub fn score_timing_regularity(intervals_ms: &[f64]) -> f64 {
    if intervals_ms.len() < 2 {
        return 0.0;
    }

    let mean = intervals_ms.iter().sum::<f64>() / intervals_ms.len() as f64;
    if mean == 0.0 {
        return 1.0;
    }

    // Sample standard deviation (n - 1), matching the signal's calibration.
    let variance = intervals_ms
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>()
        / (intervals_ms.len() - 1) as f64;
    let cv = variance.sqrt() / mean;

    if cv < 0.05 {
        1.0
    } else if cv < 0.15 {
        0.8
    } else if cv < 0.3 {
        0.5
    } else if cv < 0.5 {
        0.3
    } else {
        0.1
    }
}

// ─── Signal 2: path enumeration ─────────────────────────────────────────────

static SYSTEMATIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^/\.(well-known|git|env|svn|DS_Store)",
        r"^/(robots\.txt|sitemap\.xml|openapi\.json)",
        r"^/api/(v\d+/)?[a-z]+$",
        r"^/(admin|internal|debug|config|status|health)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("systematic probe pattern is valid"))
    .collect()
});

const DISCOVERY_PATHS: [&str; 5] = [
    "/robots.txt",
    "/sitemap.xml",
    "/openapi.json",
    "/.well-known/ai-plugin.json",
    "/.well-known/mcp.json",
];

/// Score whether the ordered path history looks like systematic
/// enumeration rather than link-following.
pub fn score_path_enumeration(paths: &[String]) -> f64 {
    if paths.len() < 3 {
        return 0.0;
    }

    let mut score: f64 = 0.0;

    // Unique paths, preserving first-hit order.
    let mut unique_ordered: Vec<&str> = Vec::new();
    for p in paths {
        if !unique_ordered.contains(&p.as_str()) {
            unique_ordered.push(p);
        }
    }

    let systematic_hits = unique_ordered
        .iter()
        .filter(|p| SYSTEMATIC_PATTERNS.iter().any(|pat| pat.is_match(p)))
        .count();
    if systematic_hits >= 3 {
        score += 0.4;
    } else if systematic_hits >= 1 {
        score += 0.2;
    }

    let mut sorted = unique_ordered.clone();
    sorted.sort_unstable();
    if unique_ordered == sorted {
        score += 0.3;
    }

    let unique_ratio = unique_ordered.len() as f64 / paths.len() as f64;
    if unique_ratio > 0.9 {
        score += 0.2;
    } else if unique_ratio > 0.7 {
        score += 0.1;
    }

    let discovery_visited = unique_ordered
        .iter()
        .filter(|p| DISCOVERY_PATHS.contains(*p))
        .count();
    if discovery_visited >= 2 {
        score += 0.2;
    }

    score.min(1.0)
}

// ─── Signal 3: header anomalies ─────────────────────────────────────────────

static BOT_UA: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"python-requests|python-httpx|node-fetch|axios|httpie|curl|wget|go-http-client|java/|openai|anthropic|langchain|llama|mcp-client|bot|crawler|spider|scraper",
    )
    .case_insensitive(true)
    .build()
    .expect("bot UA pattern is valid")
});

static BROWSER_UA: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"Mozilla/5\.0.*(Chrome/|Firefox/|Safari/)")
        .case_insensitive(true)
        .build()
        .expect("browser UA pattern is valid")
});

/// Score missing or non-browser header shapes. Expects lowercase keys; any
/// mixed-case input is normalized first.
pub fn score_header_anomalies(headers: &BTreeMap<String, String>) -> f64 {
    let h: BTreeMap<String, &str> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.as_str()))
        .collect();
    let mut score: f64 = 0.0;

    match h.get("user-agent").copied().unwrap_or("") {
        "" => score += 0.3,
        ua if BOT_UA.is_match(ua) => score += 0.3,
        ua if !BROWSER_UA.is_match(ua) => score += 0.2,
        _ => {}
    }

    if !h.contains_key("referer") {
        score += 0.1;
    }

    match h.get("accept").copied().unwrap_or("") {
        "application/json" => score += 0.1,
        "*/*" => score += 0.05,
        "" => score += 0.15,
        _ => {}
    }

    if !h.contains_key("accept-language") {
        score += 0.1;
    }
    if !h.contains_key("accept-encoding") {
        score += 0.05;
    }

    if h.contains_key("x-mcp-version") || h.contains_key("x-openai-api-key") {
        score += 0.3;
    }

    score.min(1.0)
}

// ─── Signal 4: prompt leakage ───────────────────────────────────────────────

static PROMPT_LEAK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"as an ai\b",
        r"as a language model\b",
        r"i'?m an ai\b",
        r"i'?m a language model\b",
        r"</?(?:system|user|assistant|human|tool_use|tool_result)\b",
        r"</?(?:function_call|observation|thought|thinking|scratchpad)\b",
        r"\bfunction_call\s*\(",
        r"\btool_call\b",
        r"```(?:json|xml|yaml)\s*\{",
        r"<\|(?:im_start|im_end|system|user|assistant)\|>",
        r"\b(?:step \d+|let me|i will now|first,? i)\b.*\b(?:api|endpoint|request)\b",
        r"(?:chain.?of.?thought|reasoning|tool.?use)",
    ]
    .iter()
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("prompt leak pattern is valid")
    })
    .collect()
});

/// Score LLM artifacts leaking into a request body: role tags, tool-call
/// syntax, special tokens, chain-of-thought narration.
pub fn score_prompt_leakage(body: Option<&str>) -> f64 {
    let Some(body) = body else {
        return 0.0;
    };
    if body.is_empty() {
        return 0.0;
    }

    let matches = PROMPT_LEAK_PATTERNS
        .iter()
        .filter(|pat| pat.is_match(body))
        .count();

    match matches {
        0 => 0.0,
        1 => 0.5,
        2 | 3 => 0.8,
        _ => 1.0,
    }
}

// ─── Signal 5: MCP behavior ─────────────────────────────────────────────────

/// Score MCP protocol usage. Speaking JSON-RPC MCP at all is a strong
/// agent signal; walking the full lifecycle is stronger.
pub fn score_mcp_behavior(used_mcp: bool, mcp_methods: &[String]) -> f64 {
    if !used_mcp {
        return 0.0;
    }

    let mut score: f64 = 0.7;
    for lifecycle in ["initialize", "tools/list", "tools/call"] {
        if mcp_methods.iter().any(|m| m == lifecycle) {
            score += 0.1;
        }
    }
    score.min(1.0)
}

// ─── Composite ──────────────────────────────────────────────────────────────

/// Fixed weighted sum of the five signals, clamped to `[0, 1]`.
pub fn compute_composite(
    timing_regularity: f64,
    path_enumeration: f64,
    header_anomaly: f64,
    prompt_leakage: f64,
    mcp_behavior: f64,
) -> f64 {
    let raw = W_TIMING * timing_regularity
        + W_PATH * path_enumeration
        + W_HEADER * header_anomaly
        + W_PROMPT * prompt_leakage
        + W_MCP * mcp_behavior;
    raw.clamp(0.0, 1.0)
}

/// Inputs the session aggregator derives from a session's rolling history.
#[derive(Debug, Default)]
pub struct FingerprintInput<'a> {
    pub headers: &'a [(String, String)],
    pub body: Option<&'a str>,
    pub paths: &'a [String],
    pub intervals_ms: &'a [f64],
    pub used_mcp: bool,
    pub mcp_methods: &'a [String],
}

/// Run all five signal analyzers and fill a complete score set.
pub fn fingerprint_request(input: &FingerprintInput<'_>) -> FingerprintScores {
    let headers: BTreeMap<String, String> = input
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let timing = score_timing_regularity(input.intervals_ms);
    let paths = score_path_enumeration(input.paths);
    let header = score_header_anomalies(&headers);
    let prompt = score_prompt_leakage(input.body);
    let mcp = score_mcp_behavior(input.used_mcp, input.mcp_methods);

    FingerprintScores {
        timing_regularity: timing,
        path_enumeration: paths,
        header_anomaly: header,
        prompt_leakage: prompt,
        mcp_behavior: mcp,
        composite: compute_composite(timing, paths, header, prompt, mcp),
    }
}
