//! Bounded query execution
//!
//! Re-invokes the safety gate immediately before execution: a verdict computed
//! earlier in the call chain is never trusted at the point of use.

use crate::db::{Database, QueryRows};
use crate::error::{AssistantError, Result};
use crate::safety;
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub rows: QueryRows,
    pub execution_time_ms: u64,
}

/// Execute model-generated SQL. The gate runs again here regardless of what
/// the caller already checked.
pub async fn execute_gated(db: &Database, sql: &str, max_rows: usize) -> Result<ExecutionOutcome> {
    let verdict = safety::check(sql);
    if !verdict.safe {
        return Err(AssistantError::UnsafeSql(
            verdict.notes.unwrap_or_else(|| "rejected by safety gate".to_string()),
        ));
    }
    execute_trusted(db, sql, max_rows).await
}

/// Execute hand-authored SQL (interceptor insight queries). No gate; the
/// statement never came from a model. RLS must already be applied.
pub async fn execute_trusted(db: &Database, sql: &str, max_rows: usize) -> Result<ExecutionOutcome> {
    let started = Instant::now();
    match db.fetch_rows(sql, max_rows).await {
        Ok(rows) => {
            let execution_time_ms = started.elapsed().as_millis() as u64;
            info!(
                rows = rows.row_count(),
                elapsed_ms = execution_time_ms,
                "Query executed"
            );
            Ok(ExecutionOutcome {
                rows,
                execution_time_ms,
            })
        }
        Err(e) => {
            // Full detail stays server-side; callers surface only a generic
            // "unable to retrieve data" message.
            error!(sql = sql, "Query execution failed: {}", e);
            Err(e)
        }
    }
}
