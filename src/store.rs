//! Persistent Store
//!
//! SQLite-backed storage for everything that outlives a session:
//! - user preferences (upsert per user + key)
//! - reminders with a per-user active cap
//! - knowledge base with a trigger-maintained FTS5 index
//! - append-only feedback records
//!
//! One connection behind a mutex; every public method is a single
//! statement or a single transaction.

use crate::error::{AssistantError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Stored preferences for one user, ordered by key
pub type Preferences = BTreeMap<String, String>;

/// A scheduled reminder row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    /// Unix timestamp (seconds)
    pub scheduled_at: i64,
    pub created_at: i64,
    pub is_completed: bool,
}

impl Reminder {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            text: row.get(2)?,
            scheduled_at: row.get(3)?,
            created_at: row.get(4)?,
            is_completed: row.get(5)?,
        })
    }

    /// Name of the one-shot trigger armed for this reminder
    pub fn job_key(&self) -> String {
        job_key(self.id)
    }
}

/// Scheduler key for a reminder id
pub fn job_key(id: i64) -> String {
    format!("reminder_{}", id)
}

#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Reason attached to a negative rating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackReason {
    NotHelpful,
    Incorrect,
    Inappropriate,
    Other,
}

impl FeedbackReason {
    /// Map the two-letter code carried by `df:` buttons
    pub fn from_code(code: &str) -> Self {
        match code {
            "nh" => Self::NotHelpful,
            "ic" => Self::Incorrect,
            "ia" => Self::Inappropriate,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotHelpful => "not_helpful",
            Self::Incorrect => "incorrect",
            Self::Inappropriate => "inappropriate",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackRecord {
    pub id: i64,
    pub user_id: i64,
    pub message_id: String,
    pub rating: i64,
    pub reason: Option<String>,
    pub details: Option<String>,
    pub created_at: i64,
}

/// SQLite store shared by all workers
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database file
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Store opened: {}", path.display());
        Ok(store)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id INTEGER NOT NULL,
                preference_key TEXT NOT NULL,
                preference_value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, preference_key)
            );

            CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                scheduled_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders(user_id);
            CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(is_completed, scheduled_at);

            CREATE TABLE IF NOT EXISTS knowledge_base (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_base_fts USING fts5(
                question,
                answer,
                content='knowledge_base',
                content_rowid='id'
            );

            CREATE TRIGGER IF NOT EXISTS knowledge_base_ai AFTER INSERT ON knowledge_base BEGIN
                INSERT INTO knowledge_base_fts(rowid, question, answer)
                VALUES (new.id, new.question, new.answer);
            END;

            CREATE TRIGGER IF NOT EXISTS knowledge_base_ad AFTER DELETE ON knowledge_base BEGIN
                INSERT INTO knowledge_base_fts(knowledge_base_fts, rowid, question, answer)
                VALUES ('delete', old.id, old.question, old.answer);
            END;

            CREATE TRIGGER IF NOT EXISTS knowledge_base_au AFTER UPDATE ON knowledge_base BEGIN
                INSERT INTO knowledge_base_fts(knowledge_base_fts, rowid, question, answer)
                VALUES ('delete', old.id, old.question, old.answer);
                INSERT INTO knowledge_base_fts(rowid, question, answer)
                VALUES (new.id, new.question, new.answer);
            END;

            CREATE TABLE IF NOT EXISTS user_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                message_id TEXT NOT NULL,
                rating INTEGER NOT NULL,
                reason TEXT,
                details TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_feedback_user ON user_feedback(user_id);
            "#,
        )?;
        Ok(())
    }

    // ============ Preferences ============

    /// Upsert one preference (last write wins)
    pub fn set_preference(&self, user_id: i64, key: &str, value: &str) -> Result<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO user_preferences (user_id, preference_key, preference_value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, preference_key) DO UPDATE SET
                preference_value = excluded.preference_value,
                updated_at = excluded.updated_at
            "#,
            params![user_id, key, value, Utc::now().timestamp()],
        )?;
        debug!(user_id, key, "Preference set");
        Ok(())
    }

    pub fn get_preference(&self, user_id: i64, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT preference_value FROM user_preferences WHERE user_id = ?1 AND preference_key = ?2",
                params![user_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn get_preferences(&self, user_id: i64) -> Result<Preferences> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT preference_key, preference_value FROM user_preferences WHERE user_id = ?1",
        )?;
        let prefs = stmt
            .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(prefs)
    }

    /// Returns false when there was nothing to delete
    pub fn delete_preference(&self, user_id: i64, key: &str) -> Result<bool> {
        let rows = self.conn.lock().execute(
            "DELETE FROM user_preferences WHERE user_id = ?1 AND preference_key = ?2",
            params![user_id, key],
        )?;
        Ok(rows > 0)
    }

    // ============ Reminders ============

    /// Create a reminder unless the user already holds `max_active`
    /// uncompleted ones. Count and insert share one transaction under the
    /// connection lock, so concurrent creators cannot overshoot the cap.
    pub fn create_reminder(
        &self,
        user_id: i64,
        text: &str,
        scheduled_at: i64,
        max_active: usize,
    ) -> Result<Reminder> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM reminders WHERE user_id = ?1 AND is_completed = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        if active as usize >= max_active {
            return Err(AssistantError::LimitReached { max: max_active });
        }

        let created_at = Utc::now().timestamp();
        tx.execute(
            "INSERT INTO reminders (user_id, text, scheduled_at, created_at, is_completed) VALUES (?1, ?2, ?3, ?4, 0)",
            params![user_id, text, scheduled_at, created_at],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Reminder {
            id,
            user_id,
            text: text.to_string(),
            scheduled_at,
            created_at,
            is_completed: false,
        })
    }

    pub fn get_reminder(&self, id: i64) -> Result<Option<Reminder>> {
        let reminder = self
            .conn
            .lock()
            .query_row(
                "SELECT id, user_id, text, scheduled_at, created_at, is_completed FROM reminders WHERE id = ?1",
                params![id],
                Reminder::from_row,
            )
            .optional()?;
        Ok(reminder)
    }

    /// Active reminders for a user, soonest first
    pub fn active_reminders(&self, user_id: i64) -> Result<Vec<Reminder>> {
        self.query_reminders(
            "SELECT id, user_id, text, scheduled_at, created_at, is_completed FROM reminders
             WHERE user_id = ?1 AND is_completed = 0 ORDER BY scheduled_at",
            params![user_id],
        )
    }

    /// Every active reminder, used to re-arm triggers after a restart
    pub fn all_active_reminders(&self) -> Result<Vec<Reminder>> {
        self.query_reminders(
            "SELECT id, user_id, text, scheduled_at, created_at, is_completed FROM reminders
             WHERE is_completed = 0 ORDER BY scheduled_at",
            params![],
        )
    }

    /// Active reminders whose time has passed
    pub fn due_reminders(&self, now: i64) -> Result<Vec<Reminder>> {
        self.query_reminders(
            "SELECT id, user_id, text, scheduled_at, created_at, is_completed FROM reminders
             WHERE is_completed = 0 AND scheduled_at <= ?1 ORDER BY scheduled_at",
            params![now],
        )
    }

    fn query_reminders<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Reminder>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let reminders = stmt
            .query_map(params, Reminder::from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(reminders)
    }

    /// Flip a reminder to completed. Returns true only for the caller that
    /// performed the transition; this is the delivery gate.
    pub fn complete_reminder(&self, id: i64) -> Result<bool> {
        let rows = self.conn.lock().execute(
            "UPDATE reminders SET is_completed = 1 WHERE id = ?1 AND is_completed = 0",
            params![id],
        )?;
        Ok(rows == 1)
    }

    /// Delete a still-scheduled reminder owned by `user_id`
    pub fn delete_reminder(&self, id: i64, user_id: i64) -> Result<bool> {
        let rows = self.conn.lock().execute(
            "DELETE FROM reminders WHERE id = ?1 AND user_id = ?2 AND is_completed = 0",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // ============ Knowledge Base ============

    pub fn add_knowledge(&self, question: &str, answer: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO knowledge_base (question, answer, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![question, answer, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, "Knowledge entry added");
        Ok(id)
    }

    pub fn update_knowledge(&self, id: i64, question: &str, answer: &str) -> Result<bool> {
        let rows = self.conn.lock().execute(
            "UPDATE knowledge_base SET question = ?2, answer = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, question, answer, Utc::now().timestamp()],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_knowledge(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .lock()
            .execute("DELETE FROM knowledge_base WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Full-text search over question + answer.
    ///
    /// Terms are matched as prefixes; when the index finds nothing the
    /// query is retried as a plain substring so fragments of a word still hit.
    pub fn search_knowledge(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>> {
        let fts_query = query
            .split_whitespace()
            .map(|w| w.replace('"', ""))
            .filter(|w| !w.is_empty())
            .map(|w| format!("\"{}\"*", w))
            .collect::<Vec<_>>()
            .join(" OR ");

        if fts_query.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT k.id, k.question, k.answer, k.created_at, k.updated_at
            FROM knowledge_base_fts
            JOIN knowledge_base k ON knowledge_base_fts.rowid = k.id
            WHERE knowledge_base_fts MATCH ?1
            ORDER BY bm25(knowledge_base_fts)
            LIMIT ?2
            "#,
        )?;
        let results: Vec<KnowledgeEntry> = stmt
            .query_map(params![fts_query, limit], knowledge_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        if !results.is_empty() {
            return Ok(results);
        }

        let pattern = format!("%{}%", query.trim());
        let mut stmt = conn.prepare(
            r#"
            SELECT id, question, answer, created_at, updated_at
            FROM knowledge_base
            WHERE question LIKE ?1 OR answer LIKE ?1
            ORDER BY updated_at DESC
            LIMIT ?2
            "#,
        )?;
        let results = stmt
            .query_map(params![pattern, limit], knowledge_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(results)
    }

    // ============ Feedback ============

    /// Append a feedback record
    pub fn store_feedback(
        &self,
        user_id: i64,
        message_id: &str,
        rating: i64,
        reason: Option<FeedbackReason>,
        details: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_feedback (user_id, message_id, rating, reason, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                message_id,
                rating,
                reason.map(|r| r.as_str()),
                details,
                Utc::now().timestamp()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn feedback_for_user(&self, user_id: i64) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, message_id, rating, reason, details, created_at
             FROM user_feedback WHERE user_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![user_id], |row| {
                Ok(FeedbackRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    message_id: row.get(2)?,
                    rating: row.get(3)?,
                    reason: row.get(4)?,
                    details: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }
}

fn knowledge_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    Ok(KnowledgeEntry {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
