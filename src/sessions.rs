//! Per-source session tracking and score aggregation.
//!
//! The aggregator serializes all updates for one source IP behind a
//! per-source async mutex while sources proceed in parallel. Every recorded
//! event re-derives the scorer inputs from the session's rolling history
//! and refreshes both the event's and the session's scores.

use crate::classify;
use crate::error::FeintError;
use crate::fingerprint::{self, FingerprintInput};
use crate::models::{RequestEvent, Session, TrapType};
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Idle window after which a returning source gets a fresh session.
/// Fixed rather than configurable so the reuse boundary stays testable.
pub const SESSION_IDLE_SECS: i64 = 3600;

/// Number of most-recent inter-request intervals fed to the timing signal.
const MAX_TIMING_SAMPLES: usize = 16;

pub struct SessionAggregator {
    storage: Arc<Storage>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionAggregator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, source_ip: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("session lock map poisoned");
        locks
            .entry(source_ip.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Link an event to its source's session, score the session's rolling
    /// history, classify, and persist both records. Returns the updated
    /// session. Two events from the same source are serialized; distinct
    /// sources run in parallel.
    pub async fn record(&self, event: &mut RequestEvent) -> Result<Session, FeintError> {
        let lock = self.lock_for(&event.source_ip);
        let _guard = lock.lock().await;

        let mut session = self.active_session(event).await?;
        event.session_id = Some(session.id.clone());

        // Rolling history, current event excluded (not yet persisted).
        let history = self.storage.get_session_events(&session.id).await?;

        session.last_seen = event.timestamp;
        session.request_count += 1;
        session.request_ids.push(event.id.clone());
        if !session.endpoints_hit.contains(&event.path) {
            session.endpoints_hit.push(event.path.clone());
        }
        if let Some(trap) = event.trap_type {
            if !session.trap_types_triggered.contains(&trap) {
                session.trap_types_triggered.push(trap);
            }
        }

        let scores = self.score(event, &history);
        event.fingerprint_scores = scores;
        session.fingerprint_scores = scores;

        // Composite is clamped by construction, so range failure here is a
        // programmer error worth surfacing.
        let classification = classify::classify(scores.composite).map_err(FeintError::Classify)?;
        event.classification = classification;
        session.classification = classification;

        self.storage.save_event(event).await?;
        self.storage.save_session(&session).await?;

        Ok(session)
    }

    async fn active_session(&self, event: &RequestEvent) -> Result<Session, FeintError> {
        if let Some(existing) = self.storage.latest_session_for_ip(&event.source_ip).await? {
            let age_secs = (event.timestamp - existing.last_seen).num_seconds();
            if age_secs < SESSION_IDLE_SECS {
                return Ok(existing);
            }
        }

        let mut session = Session::new(&event.source_ip);
        session.first_seen = event.timestamp;
        session.last_seen = event.timestamp;
        self.storage.save_session(&session).await?;
        Ok(session)
    }

    fn score(
        &self,
        event: &RequestEvent,
        history: &[RequestEvent],
    ) -> crate::models::FingerprintScores {
        // Ordered timestamps, current event last.
        let mut timestamps: Vec<_> = history.iter().map(|e| e.timestamp).collect();
        timestamps.push(event.timestamp);
        let intervals: Vec<f64> = timestamps
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64)
            .collect();
        let start = intervals.len().saturating_sub(MAX_TIMING_SAMPLES);
        let intervals = &intervals[start..];

        let mut paths: Vec<String> = history.iter().map(|e| e.path.clone()).collect();
        paths.push(event.path.clone());

        let used_mcp = event.trap_type == Some(TrapType::Mcp)
            || history.iter().any(|e| e.trap_type == Some(TrapType::Mcp));
        let mcp_methods: Vec<String> = history
            .iter()
            .chain(std::iter::once(&*event))
            .filter(|e| e.trap_type == Some(TrapType::Mcp))
            .filter_map(|e| {
                e.body_json
                    .as_ref()
                    .and_then(|body| body.get("method"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .collect();

        let headers: Vec<(String, String)> = event
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        fingerprint::fingerprint_request(&FingerprintInput {
            headers: &headers,
            body: event.body.as_deref(),
            paths: &paths,
            intervals_ms: intervals,
            used_mcp,
            mcp_methods: &mcp_methods,
        })
    }
}
