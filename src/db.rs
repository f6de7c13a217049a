//! Database connection management using sqlx
//!
//! The reporting store runs on one of two backends: a file-based SQLite
//! database or a networked PostgreSQL database. Generated SQL is plain text,
//! so rows are decoded dynamically into JSON values.

use crate::config::SqlDialect;
use crate::error::{AssistantError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};
use std::time::Duration;
use tracing::warn;

/// Result of a dynamic read query.
#[derive(Debug, Clone)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryRows {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as JSON objects keyed by column name, for response payloads.
    pub fn to_objects(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (col, val) in self.columns.iter().zip(row.iter()) {
                    obj.insert(col.clone(), val.clone());
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

/// Connection pool over whichever backend is configured.
#[derive(Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl Database {
    /// Connect and probe the pool with `SELECT 1`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let dialect = SqlDialect::from_database_url(database_url)?;
        let db = match dialect {
            SqlDialect::Sqlite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(database_url)
                    .await
                    .map_err(|e| AssistantError::Database(e.to_string()))?;
                Database::Sqlite(pool)
            }
            SqlDialect::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(database_url)
                    .await
                    .map_err(|e| AssistantError::Database(e.to_string()))?;
                Database::Postgres(pool)
            }
        };
        db.fetch_rows("SELECT 1", 1).await?;
        Ok(db)
    }

    pub fn dialect(&self) -> SqlDialect {
        match self {
            Database::Sqlite(_) => SqlDialect::Sqlite,
            Database::Postgres(_) => SqlDialect::Postgres,
        }
    }

    /// Run a read query and decode up to `limit` rows. The result set is
    /// streamed and abandoned at the cap, so a statement without its own
    /// LIMIT never buffers the full result in memory.
    pub async fn fetch_rows(&self, sql: &str, limit: usize) -> Result<QueryRows> {
        match self {
            Database::Sqlite(pool) => {
                let mut stream = sqlx::query(sql).fetch(pool);
                let mut rows: Vec<SqliteRow> = Vec::new();
                while rows.len() < limit {
                    match stream
                        .try_next()
                        .await
                        .map_err(|e| AssistantError::Database(e.to_string()))?
                    {
                        Some(row) => rows.push(row),
                        None => break,
                    }
                }
                Ok(decode_rows(&rows, limit, decode_sqlite_value))
            }
            Database::Postgres(pool) => {
                let mut stream = sqlx::query(sql).fetch(pool);
                let mut rows: Vec<PgRow> = Vec::new();
                while rows.len() < limit {
                    match stream
                        .try_next()
                        .await
                        .map_err(|e| AssistantError::Database(e.to_string()))?
                    {
                        Some(row) => rows.push(row),
                        None => break,
                    }
                }
                Ok(decode_rows(&rows, limit, decode_pg_value))
            }
        }
    }

    /// Run a statement for its side effects (schema setup, audit writes).
    pub async fn execute_raw(&self, sql: &str) -> Result<()> {
        match self {
            Database::Sqlite(pool) => sqlx::query(sql)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| AssistantError::Database(e.to_string())),
            Database::Postgres(pool) => sqlx::query(sql)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| AssistantError::Database(e.to_string())),
        }
    }
}

fn decode_rows<R: Row>(
    rows: &[R],
    limit: usize,
    decode: impl Fn(&R, usize) -> serde_json::Value,
) -> QueryRows {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let decoded = rows
        .iter()
        .take(limit)
        .map(|row| (0..row.columns().len()).map(|i| decode(row, i)).collect())
        .collect();
    QueryRows {
        columns,
        rows: decoded,
    }
}

fn number_value(n: f64) -> serde_json::Value {
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn decode_sqlite_value(row: &SqliteRow, idx: usize) -> serde_json::Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|n| serde_json::Value::Number(n.into())).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(number_value).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(serde_json::Value::Bool).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null);
    }
    warn!(column = idx, "Could not decode SQLite column value, returning null");
    serde_json::Value::Null
}

fn decode_pg_value(row: &PgRow, idx: usize) -> serde_json::Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|n| serde_json::Value::Number(n.into())).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|n| serde_json::Value::Number(n.into())).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(number_value).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(serde_json::Value::Bool).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v
            .map(|d| serde_json::Value::String(d.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v
            .map(|d| serde_json::Value::String(d.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        return v
            .map(|d| serde_json::Value::String(d.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
        return v
            .map(|u| serde_json::Value::String(u.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    warn!(column = idx, "Could not decode Postgres column value, returning null");
    serde_json::Value::Null
}
