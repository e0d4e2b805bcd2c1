//! SQLite-backed feedback store

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ErrorPattern, FeedbackStats, FeedbackStore, RecurringOriginal};
use crate::error::EngineError;
use crate::types::{ApprovalState, Correction, FeedbackRecord};

const RECORD_COLUMNS: &str = "id, type, original_text, current_translation, suggested_translation,
     target_language, approved, approved_by, created_at, approved_at";

/// SQLite-based feedback store
pub struct SqliteFeedbackStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFeedbackStore {
    /// Open (or create) the database at the given path
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await
                .context("Failed to create feedback database directory")?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open feedback database {}", path.display()))?;

        // WAL keeps readers unblocked while the validator writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS translation_feedbacks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                original_text TEXT NOT NULL,
                current_translation TEXT,
                suggested_translation TEXT,
                target_language TEXT NOT NULL,
                approved INTEGER NOT NULL DEFAULT 0,
                approved_by TEXT,
                created_at TEXT NOT NULL,
                approved_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_feedbacks_state ON translation_feedbacks(approved, id);
            CREATE INDEX IF NOT EXISTS idx_feedbacks_type ON translation_feedbacks(type);
        "#).context("Failed to initialize feedback schema")?;

        Ok(())
    }

    fn parse_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FeedbackRecord> {
        let created_at: String = row.get(8)?;
        let approved_at: Option<String> = row.get(9)?;

        Ok(FeedbackRecord {
            id: row.get(0)?,
            domain_type: row.get(1)?,
            original_text: row.get(2)?,
            current_translation: row.get(3)?,
            suggested_translation: row.get(4)?,
            target_language: row.get(5)?,
            approval: ApprovalState::from_code(row.get(6)?),
            approved_by: row.get(7)?,
            created_at: Self::parse_time(&created_at),
            approved_at: approved_at.as_deref().map(Self::parse_time),
        })
    }

    fn query_records(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<FeedbackRecord>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let records = stmt
            .query_map(args, Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn set_state(conn: &Connection, id: i64, state: ApprovalState, approver: Option<&str>) -> Result<()> {
        let approved_at = match state {
            ApprovalState::Approved => Some(Utc::now().to_rfc3339()),
            _ => None,
        };
        let changed = conn.execute(
            "UPDATE translation_feedbacks SET approved = ?1, approved_by = ?2, approved_at = ?3 WHERE id = ?4",
            params![state.code(), approver, approved_at, id],
        )?;
        if changed == 0 {
            return Err(EngineError::FeedbackNotFound(id).into());
        }
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn insert(&self, correction: &Correction) -> Result<FeedbackRecord> {
        let conn = self.conn.lock().await;

        conn.execute(
            r#"INSERT INTO translation_feedbacks
               (type, original_text, current_translation, suggested_translation, target_language, approved, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)"#,
            params![
                correction.domain_type.trim(),
                correction.original_text,
                correction.current_translation,
                correction.suggested_translation,
                correction.target_language.trim().to_lowercase(),
                Utc::now().to_rfc3339(),
            ],
        ).context("Failed to insert feedback")?;

        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM translation_feedbacks WHERE id = ?1", RECORD_COLUMNS);
        let record = conn
            .query_row(&sql, params![id], Self::row_to_record)
            .context("Failed to read inserted feedback")?;
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<FeedbackRecord>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {} FROM translation_feedbacks WHERE id = ?1", RECORD_COLUMNS);
        let record = conn
            .query_row(&sql, params![id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    async fn fetch_pending(&self) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM translation_feedbacks WHERE approved = 0 ORDER BY id ASC",
            RECORD_COLUMNS
        );
        Self::query_records(&conn, &sql, [])
    }

    async fn fetch_approved_since(&self, cursor: i64, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM translation_feedbacks
             WHERE approved = 1 AND id > ?1
             ORDER BY id ASC LIMIT ?2",
            RECORD_COLUMNS
        );
        Self::query_records(&conn, &sql, params![cursor, limit as i64])
    }

    async fn fetch_approved_all(&self) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM translation_feedbacks WHERE approved = 1 ORDER BY id ASC",
            RECORD_COLUMNS
        );
        Self::query_records(&conn, &sql, [])
    }

    async fn mark_approved(&self, id: i64, approver: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        Self::set_state(&conn, id, ApprovalState::Approved, Some(approver))
    }

    async fn approve_if_pending(&self, id: i64, approver: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE translation_feedbacks SET approved = ?1, approved_by = ?2, approved_at = ?3
             WHERE id = ?4 AND approved = ?5",
            params![
                ApprovalState::Approved.code(),
                approver,
                Utc::now().to_rfc3339(),
                id,
                ApprovalState::Pending.code(),
            ],
        )?;
        Ok(changed > 0)
    }

    async fn mark_rejected(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        Self::set_state(&conn, id, ApprovalState::Rejected, None)
    }

    async fn list(&self, state: Option<ApprovalState>, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock().await;
        match state {
            Some(state) => {
                let sql = format!(
                    "SELECT {} FROM translation_feedbacks WHERE approved = ?1 ORDER BY id DESC LIMIT ?2",
                    RECORD_COLUMNS
                );
                Self::query_records(&conn, &sql, params![state.code(), limit as i64])
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM translation_feedbacks ORDER BY id DESC LIMIT ?1",
                    RECORD_COLUMNS
                );
                Self::query_records(&conn, &sql, params![limit as i64])
            }
        }
    }

    async fn stats(&self) -> Result<FeedbackStats> {
        let conn = self.conn.lock().await;
        let mut stats = FeedbackStats::default();

        let mut stmt = conn.prepare_cached(
            "SELECT type, approved, COUNT(*) FROM translation_feedbacks GROUP BY type, approved",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (domain_type, code, count) in rows {
            let state = ApprovalState::from_code(code);
            stats.counts.add(state, count as u64);
            stats.by_type.entry(domain_type).or_default().add(state, count as u64);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT target_language, COUNT(*) FROM translation_feedbacks GROUP BY target_language",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (language, count) in rows {
            stats.by_language.insert(language, count as u64);
        }

        Ok(stats)
    }

    async fn error_patterns(&self, limit: usize) -> Result<Vec<ErrorPattern>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            r#"SELECT original_text, current_translation, suggested_translation, type, target_language,
                      COUNT(*) AS frequency
               FROM translation_feedbacks
               WHERE approved IN (0, 1)
                 AND suggested_translation IS NOT NULL
                 AND TRIM(suggested_translation) != ''
                 AND (current_translation IS NULL OR suggested_translation != current_translation)
               GROUP BY original_text, current_translation, suggested_translation, type, target_language
               ORDER BY frequency DESC, MAX(id) DESC
               LIMIT ?1"#,
        )?;
        let patterns = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ErrorPattern {
                    original: row.get(0)?,
                    wrong: row.get(1)?,
                    correct: row.get(2)?,
                    domain_type: row.get(3)?,
                    language: row.get(4)?,
                    frequency: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patterns)
    }

    async fn recurring_originals(&self, limit: usize) -> Result<Vec<RecurringOriginal>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            r#"SELECT original_text, type, target_language, COUNT(*) AS corrections
               FROM translation_feedbacks
               WHERE approved IN (0, 1)
               GROUP BY original_text, type, target_language
               ORDER BY corrections DESC, MAX(id) DESC
               LIMIT ?1"#,
        )?;
        let originals = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RecurringOriginal {
                    original: row.get(0)?,
                    domain_type: row.get(1)?,
                    language: row.get(2)?,
                    count: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(originals)
    }
}
