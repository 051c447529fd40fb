//! Composite-score classification.
//!
//! Threshold boundaries:
//!   `< 0.3` → human, `< 0.6` → automated, `< 0.8` → ai_assisted,
//!   `≥ 0.8` → ai_agent.

use crate::error::ClassifyError;
use crate::models::{Classification, FingerprintScores};
use serde::Serialize;

const THRESHOLD_HUMAN: f64 = 0.3;
const THRESHOLD_AUTOMATED: f64 = 0.6;
const THRESHOLD_AI_ASSISTED: f64 = 0.8;

/// Map a composite fingerprint score onto the four-tier classification.
/// Inputs outside `[0, 1]` are a programmer error.
pub fn classify(composite: f64) -> Result<Classification, ClassifyError> {
    if !(0.0..=1.0).contains(&composite) {
        return Err(ClassifyError::OutOfRange(composite));
    }

    Ok(if composite < THRESHOLD_HUMAN {
        Classification::Human
    } else if composite < THRESHOLD_AUTOMATED {
        Classification::Automated
    } else if composite < THRESHOLD_AI_ASSISTED {
        Classification::AiAssisted
    } else {
        Classification::AiAgent
    })
}

/// Classification plus the per-signal breakdown and the dominant signal.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationDetails {
    pub classification: Classification,
    pub composite_score: f64,
    pub dominant_signal: &'static str,
    pub scores: FingerprintScores,
}

/// Classify and report which signal drove the verdict.
pub fn classify_with_details(
    scores: &FingerprintScores,
) -> Result<ClassificationDetails, ClassifyError> {
    Ok(ClassificationDetails {
        classification: classify(scores.composite)?,
        composite_score: scores.composite,
        dominant_signal: scores.dominant_signal(),
        scores: *scores,
    })
}
