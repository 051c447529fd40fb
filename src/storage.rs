//! SQLite persistence for captured events and sessions, with an optional
//! JSON-Lines mirror for streaming consumers.
//!
//! Writes are append-or-replace by primary key. The mirror log is opened in
//! append mode per write and failures there are logged, never fatal.

use crate::error::StorageError;
use crate::models::{Classification, FingerprintScores, RequestEvent, Session, TrapType};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub struct Storage {
    pool: SqlitePool,
    log_path: Option<PathBuf>,
}

impl Storage {
    /// Open (or create) the database file and run schema setup.
    pub async fn open(db_path: &Path, log_path: Option<&Path>) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Open(e.to_string()))?;
        }
        if let Some(parent) = log_path.and_then(Path::parent) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Open(e.to_string()))?;
        }

        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| StorageError::Open(e.to_string()))?;

        sqlx::raw_sql("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .execute(&pool)
            .await?;
        init_schema(&pool).await?;

        Ok(Self {
            pool,
            log_path: log_path.map(Path::to_path_buf),
        })
    }

    /// Open an in-memory database. A single connection keeps every reader
    /// and writer on the same database instance.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StorageError::Open(e.to_string()))?;
        init_schema(&pool).await?;
        Ok(Self {
            pool,
            log_path: None,
        })
    }

    // ── Writes ───────────────────────────────────────────────

    pub async fn save_event(&self, event: &RequestEvent) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR REPLACE INTO events
             (id, timestamp, session_id, source_ip, source_port, method, path,
              query_params, headers, body, body_json, content_type, user_agent,
              fingerprint_scores, classification, trap_type, matched_endpoint,
              response_status, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19)",
        )
        .bind(&event.id)
        .bind(event.timestamp.to_rfc3339())
        .bind(&event.session_id)
        .bind(&event.source_ip)
        .bind(event.source_port.map(i64::from))
        .bind(&event.method)
        .bind(&event.path)
        .bind(to_json(&event.query_params)?)
        .bind(to_json(&event.headers)?)
        .bind(&event.body)
        .bind(
            event
                .body_json
                .as_ref()
                .map(|v| serde_json::to_string(v))
                .transpose()
                .map_err(|e| StorageError::Decode(e.to_string()))?,
        )
        .bind(&event.content_type)
        .bind(&event.user_agent)
        .bind(to_json(&event.fingerprint_scores)?)
        .bind(event.classification.as_str())
        .bind(event.trap_type.map(TrapType::as_str))
        .bind(&event.matched_endpoint)
        .bind(event.response_status.map(i64::from))
        .bind(&event.notes)
        .execute(&self.pool)
        .await?;

        self.log_event(event).await;
        Ok(())
    }

    pub async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR REPLACE INTO sessions
             (id, source_ip, first_seen, last_seen, request_count, request_ids,
              classification, fingerprint_scores, endpoints_hit, trap_types_triggered,
              tags, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&session.id)
        .bind(&session.source_ip)
        .bind(session.first_seen.to_rfc3339())
        .bind(session.last_seen.to_rfc3339())
        .bind(session.request_count as i64)
        .bind(to_json(&session.request_ids)?)
        .bind(session.classification.as_str())
        .bind(to_json(&session.fingerprint_scores)?)
        .bind(to_json(&session.endpoints_hit)?)
        .bind(to_json(&session.trap_types_triggered)?)
        .bind(to_json(&session.tags)?)
        .bind(&session.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── Keyed reads ──────────────────────────────────────────

    pub async fn get_event(&self, event_id: &str) -> Result<Option<RequestEvent>, StorageError> {
        let row = sqlx::query("SELECT * FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_event(&r)).transpose()
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    /// Most recent session for a source, if any. The aggregator applies
    /// the idle-window rule on top of this.
    pub async fn latest_session_for_ip(
        &self,
        source_ip: &str,
    ) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query(
            "SELECT * FROM sessions WHERE source_ip = ?1 ORDER BY last_seen DESC LIMIT 1",
        )
        .bind(source_ip)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    // ── Ordered / filtered reads ─────────────────────────────

    pub async fn get_recent_events(&self, limit: u32) -> Result<Vec<RequestEvent>, StorageError> {
        let rows = sqlx::query("SELECT * FROM events ORDER BY timestamp DESC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_event).collect()
    }

    pub async fn get_recent_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY last_seen DESC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_session).collect()
    }

    pub async fn get_session_events(
        &self,
        session_id: &str,
    ) -> Result<Vec<RequestEvent>, StorageError> {
        let rows =
            sqlx::query("SELECT * FROM events WHERE session_id = ?1 ORDER BY timestamp ASC")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_event).collect()
    }

    pub async fn get_events_by_classification(
        &self,
        classification: Classification,
        limit: u32,
    ) -> Result<Vec<RequestEvent>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE classification = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )
        .bind(classification.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    pub async fn get_events_by_source_ip(
        &self,
        source_ip: &str,
        limit: u32,
    ) -> Result<Vec<RequestEvent>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE source_ip = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )
        .bind(source_ip)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    // ── Counts ───────────────────────────────────────────────

    pub async fn count_events(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn count_sessions(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ── Event log mirror ─────────────────────────────────────

    async fn log_event(&self, event: &RequestEvent) {
        let Some(path) = self.log_path.as_ref() else {
            return;
        };

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to serialize event for log mirror");
                return;
            }
        };

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;

        if let Err(err) = result {
            warn!(error = %err, path = %path.display(), "failed to append event log");
        }
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            session_id TEXT,
            source_ip TEXT NOT NULL,
            source_port INTEGER,
            method TEXT NOT NULL,
            path TEXT NOT NULL,
            query_params TEXT NOT NULL DEFAULT '{}',
            headers TEXT NOT NULL DEFAULT '{}',
            body TEXT,
            body_json TEXT,
            content_type TEXT,
            user_agent TEXT,
            fingerprint_scores TEXT NOT NULL DEFAULT '{}',
            classification TEXT NOT NULL DEFAULT 'unknown',
            trap_type TEXT,
            matched_endpoint TEXT,
            response_status INTEGER,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            source_ip TEXT NOT NULL,
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            request_count INTEGER NOT NULL DEFAULT 0,
            request_ids TEXT NOT NULL DEFAULT '[]',
            classification TEXT NOT NULL DEFAULT 'unknown',
            fingerprint_scores TEXT NOT NULL DEFAULT '{}',
            endpoints_hit TEXT NOT NULL DEFAULT '[]',
            trap_types_triggered TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            notes TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
        CREATE INDEX IF NOT EXISTS idx_events_source_ip ON events(source_ip);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
        CREATE INDEX IF NOT EXISTS idx_events_classification ON events(classification);
        CREATE INDEX IF NOT EXISTS idx_sessions_source_ip ON sessions(source_ip);
        CREATE INDEX IF NOT EXISTS idx_sessions_classification ON sessions(classification);",
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Decode(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Decode(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Decode(e.to_string()))
}

fn row_to_event(row: &SqliteRow) -> Result<RequestEvent, StorageError> {
    let timestamp: String = row.try_get("timestamp")?;
    let query_params: String = row.try_get("query_params")?;
    let headers: String = row.try_get("headers")?;
    let body_json: Option<String> = row.try_get("body_json")?;
    let scores: String = row.try_get("fingerprint_scores")?;
    let classification: String = row.try_get("classification")?;
    let trap_type: Option<String> = row.try_get("trap_type")?;
    let source_port: Option<i64> = row.try_get("source_port")?;
    let response_status: Option<i64> = row.try_get("response_status")?;

    Ok(RequestEvent {
        id: row.try_get("id")?,
        timestamp: parse_timestamp(&timestamp)?,
        session_id: row.try_get("session_id")?,
        source_ip: row.try_get("source_ip")?,
        source_port: source_port.map(|p| p as u16),
        method: row.try_get("method")?,
        path: row.try_get("path")?,
        query_params: from_json(&query_params)?,
        headers: from_json(&headers)?,
        body: row.try_get("body")?,
        body_json: body_json.as_deref().map(from_json).transpose()?,
        content_type: row.try_get("content_type")?,
        user_agent: row.try_get("user_agent")?,
        fingerprint_scores: from_json(&scores)?,
        classification: Classification::parse(&classification),
        trap_type: trap_type.as_deref().and_then(TrapType::parse),
        matched_endpoint: row.try_get("matched_endpoint")?,
        response_status: response_status.map(|s| s as u16),
        notes: row.try_get("notes")?,
    })
}

fn row_to_session(row: &SqliteRow) -> Result<Session, StorageError> {
    let first_seen: String = row.try_get("first_seen")?;
    let last_seen: String = row.try_get("last_seen")?;
    let request_ids: String = row.try_get("request_ids")?;
    let classification: String = row.try_get("classification")?;
    let scores: String = row.try_get("fingerprint_scores")?;
    let endpoints_hit: String = row.try_get("endpoints_hit")?;
    let trap_types: String = row.try_get("trap_types_triggered")?;
    let tags: String = row.try_get("tags")?;
    let request_count: i64 = row.try_get("request_count")?;

    Ok(Session {
        id: row.try_get("id")?,
        source_ip: row.try_get("source_ip")?,
        first_seen: parse_timestamp(&first_seen)?,
        last_seen: parse_timestamp(&last_seen)?,
        request_count: request_count as u64,
        request_ids: from_json(&request_ids)?,
        classification: Classification::parse(&classification),
        fingerprint_scores: from_json::<FingerprintScores>(&scores)?,
        endpoints_hit: from_json(&endpoints_hit)?,
        trap_types_triggered: from_json(&trap_types)?,
        tags: from_json(&tags)?,
        notes: row.try_get("notes")?,
    })
}
