//! Append-only audit trail for SQL-generation requests
//!
//! One record per request, whichever path produced the SQL. Writes are
//! fire-and-forget with respect to the caller's response: failures are logged
//! and never block or fail the answer.

use crate::db::Database;
use crate::error::{AssistantError, Result};
use chrono::Utc;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: String,
    pub user_id: String,
    pub question: String,
    pub generated_sql: Option<String>,
    pub executed: bool,
    pub row_count: Option<i64>,
    pub execution_time_ms: Option<i64>,
    pub is_safe: bool,
    pub safety_notes: Option<String>,
    pub created_at: String,
}

impl AuditRecord {
    pub fn new(user_id: &str, question: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            question: question.to_string(),
            generated_sql: None,
            executed: false,
            row_count: None,
            execution_time_ms: None,
            is_safe: true,
            safety_notes: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn set_sql(&mut self, sql: Option<&str>) {
        self.generated_sql = sql.map(|s| s.to_string());
    }

    pub fn set_safety(&mut self, is_safe: bool, notes: Option<&str>) {
        self.is_safe = is_safe;
        self.safety_notes = notes.map(|s| s.to_string());
    }

    pub fn set_execution(&mut self, row_count: usize, execution_time_ms: u64) {
        self.executed = true;
        self.row_count = Some(row_count as i64);
        self.execution_time_ms = Some(execution_time_ms as i64);
    }
}

#[derive(Clone)]
pub struct AuditStore {
    db: Database,
}

impl AuditStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create the audit relation if missing. Portable DDL for both backends.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.db
            .execute_raw(
                "CREATE TABLE IF NOT EXISTS ai_query_audit (\
                 id TEXT PRIMARY KEY, \
                 user_id TEXT NOT NULL, \
                 question TEXT NOT NULL, \
                 generated_sql TEXT, \
                 executed INTEGER NOT NULL, \
                 row_count INTEGER, \
                 execution_time_ms INTEGER, \
                 is_safe INTEGER NOT NULL, \
                 safety_notes TEXT, \
                 created_at TEXT NOT NULL)",
            )
            .await
    }

    /// Insert one record. Records are never updated afterwards.
    pub async fn record(&self, rec: &AuditRecord) -> Result<()> {
        match &self.db {
            Database::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO ai_query_audit \
                     (id, user_id, question, generated_sql, executed, row_count, \
                      execution_time_ms, is_safe, safety_notes, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&rec.id)
                .bind(&rec.user_id)
                .bind(&rec.question)
                .bind(&rec.generated_sql)
                .bind(rec.executed as i32)
                .bind(rec.row_count)
                .bind(rec.execution_time_ms)
                .bind(rec.is_safe as i32)
                .bind(&rec.safety_notes)
                .bind(&rec.created_at)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| AssistantError::Database(e.to_string()))
            }
            Database::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO ai_query_audit \
                     (id, user_id, question, generated_sql, executed, row_count, \
                      execution_time_ms, is_safe, safety_notes, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                )
                .bind(&rec.id)
                .bind(&rec.user_id)
                .bind(&rec.question)
                .bind(&rec.generated_sql)
                .bind(rec.executed as i32)
                .bind(rec.row_count)
                .bind(rec.execution_time_ms)
                .bind(rec.is_safe as i32)
                .bind(&rec.safety_notes)
                .bind(&rec.created_at)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| AssistantError::Database(e.to_string()))
            }
        }
    }

    /// Write the record off the request path. The response does not wait for
    /// the audit insert; failures are logged, never swallowed silently.
    pub fn record_detached(&self, rec: AuditRecord) {
        let store = self.clone();
        tokio::spawn(async move {
            debug!(audit_id = %rec.id, "Writing audit record");
            if let Err(e) = store.record(&rec).await {
                error!(audit_id = %rec.id, "Audit write failed: {}", e);
            }
        });
    }
}
