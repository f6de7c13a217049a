//! Assistant orchestration
//!
//! Ties the pipeline together: knowledge-cache refresh, interceptor chain,
//! prompt assembly, the model call, the safety gate, RLS rewriting, bounded
//! execution, audit, and answer synthesis. One flow per incoming question;
//! within a flow the steps are strictly sequential.
//!
//! Failure behavior is uniform: flows always return a response. Degraded
//! states travel as message content; the only structured failure signal is
//! `is_safe`, which callers must branch on before executing anything.

use crate::access::CallerContext;
use crate::audit::{AuditRecord, AuditStore};
use crate::catalog::KnowledgeCache;
use crate::chart::{suggest_chart, ChartConfig};
use crate::config::AssistantConfig;
use crate::db::{Database, QueryRows};
use crate::error::Result;
use crate::executor::{execute_gated, execute_trusted, ExecutionOutcome};
use crate::interceptors::{intercept, Interception};
use crate::llm::{ChatMessage, LlmClient};
use crate::prompt;
use crate::rls::apply_rls;
use crate::safety;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const NOT_CONFIGURED_MESSAGE: &str =
    "The assistant is not configured: no language-model credentials are provisioned. \
     Ask your administrator to set them up.";

const MODEL_FAILED_MESSAGE: &str =
    "Sorry, I couldn't process that question right now. Please try again in a moment.";

const RETRIEVAL_FAILED_MESSAGE: &str =
    "I generated a query for your question but was unable to retrieve the data.";

/// Request for the SQL-generation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateSqlRequest {
    pub question: String,
    pub caller: CallerContext,
    /// When false the caller wants the SQL and explanation only.
    pub execute: bool,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Outcome of a SQL-generation flow. If `is_safe` is false the SQL was not
/// and must not be executed; if `sql` is null the explanation is the answer.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSqlResult {
    pub sql: Option<String>,
    pub explanation: String,
    pub is_safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_notes: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl GeneratedSqlResult {
    fn direct(explanation: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            sql: None,
            explanation: explanation.into(),
            is_safe: true,
            safety_notes: None,
            suggestions,
            rows: None,
            row_count: None,
            execution_time_ms: None,
        }
    }
}

/// Request for the chat endpoint. The caller owns history storage and
/// truncates it to a bounded window before passing it in.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub caller: CallerContext,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Source citation: the SQL the answer is based on, when any ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_sql: Option<String>,
}

impl ChatResponse {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            chart: None,
            suggestions: Vec::new(),
            source_sql: None,
        }
    }
}

pub struct Assistant {
    db: Database,
    llm: LlmClient,
    cache: Arc<KnowledgeCache>,
    audit: AuditStore,
    config: AssistantConfig,
}

impl Assistant {
    pub async fn new(db: Database, config: AssistantConfig) -> Result<Self> {
        let llm = LlmClient::new(config.llm.clone())?;
        let audit = AuditStore::new(db.clone());
        audit.ensure_schema().await?;
        Ok(Self {
            llm,
            audit,
            cache: Arc::new(KnowledgeCache::new(config.catalog_ttl)),
            db,
            config,
        })
    }

    /// Shared knowledge cache, injected rather than global so tests can
    /// observe refresh behavior.
    pub fn knowledge_cache(&self) -> Arc<KnowledgeCache> {
        Arc::clone(&self.cache)
    }

    /// SQL-generation flow: interceptors first, then the model; gate, RLS,
    /// optional execution; one audit record regardless of path.
    pub async fn generate_sql(&self, req: GenerateSqlRequest) -> Result<GeneratedSqlResult> {
        self.cache.ensure_fresh(&self.db).await;
        let mut audit = AuditRecord::new(&req.caller.user_id, &req.question);

        let result = match intercept(&req.question) {
            Some(Interception::DirectAnswer {
                message,
                suggestions,
            }) => {
                info!("Interceptor answered directly, no SQL generated");
                GeneratedSqlResult::direct(message, suggestions)
            }
            Some(Interception::Synthesized { sql, explanation })
            | Some(Interception::Insight {
                sql, explanation, ..
            }) => {
                // Hand-authored SQL: no gate, but RLS always applies.
                self.run_synthesized(&req, sql, explanation, &mut audit)
                    .await
            }
            None => self.generate_with_model(&req, &mut audit).await,
        };

        audit.set_sql(result.sql.as_deref());
        audit.set_safety(result.is_safe, result.safety_notes.as_deref());
        self.audit.record_detached(audit);
        Ok(result)
    }

    async fn run_synthesized(
        &self,
        req: &GenerateSqlRequest,
        sql: String,
        explanation: String,
        audit: &mut AuditRecord,
    ) -> GeneratedSqlResult {
        let mut result = GeneratedSqlResult {
            sql: Some(sql.clone()),
            explanation,
            is_safe: true,
            safety_notes: None,
            suggestions: Vec::new(),
            rows: None,
            row_count: None,
            execution_time_ms: None,
        };
        if !req.execute {
            return result;
        }
        match self.scope_and_run(&sql, &req.caller, false).await {
            Ok(outcome) => {
                audit.set_execution(outcome.rows.row_count(), outcome.execution_time_ms);
                result.row_count = Some(outcome.rows.row_count());
                result.execution_time_ms = Some(outcome.execution_time_ms);
                result.rows = Some(outcome.rows.to_objects());
            }
            Err(e) => {
                warn!("Synthesized query failed: {}", e);
                result.explanation.push_str(" Unable to retrieve data for this query.");
            }
        }
        result
    }

    async fn generate_with_model(
        &self,
        req: &GenerateSqlRequest,
        audit: &mut AuditRecord,
    ) -> GeneratedSqlResult {
        if !self.llm.is_configured() {
            return GeneratedSqlResult::direct(NOT_CONFIGURED_MESSAGE, Vec::new());
        }

        let snapshot = self.cache.snapshot();
        let system_prompt = prompt::build_sql_prompt(
            snapshot.as_ref(),
            self.db.dialect(),
            &req.caller,
            self.config.max_result_rows,
        );
        let messages = prompt::sql_generation_messages(system_prompt, &req.history, &req.question);

        let model_response = match self.llm.generate_sql(&messages).await {
            Ok(r) => r,
            Err(e) => {
                warn!("SQL generation model call failed: {}", e);
                return GeneratedSqlResult::direct(MODEL_FAILED_MESSAGE, Vec::new());
            }
        };

        let sql = match model_response.sql {
            Some(s) if !s.trim().is_empty() => s,
            _ => return GeneratedSqlResult::direct(model_response.explanation, Vec::new()),
        };

        // Independent re-check; the model's self-report never decides.
        let verdict = safety::check(&sql);
        let (is_safe, safety_notes) = reconcile_safety(model_response.is_safe, &verdict);

        let mut result = GeneratedSqlResult {
            sql: Some(sql.clone()),
            explanation: model_response.explanation,
            is_safe,
            safety_notes,
            suggestions: Vec::new(),
            rows: None,
            row_count: None,
            execution_time_ms: None,
        };

        if is_safe && req.execute {
            match self.scope_and_run(&sql, &req.caller, true).await {
                Ok(outcome) => {
                    audit.set_execution(outcome.rows.row_count(), outcome.execution_time_ms);
                    result.row_count = Some(outcome.rows.row_count());
                    result.execution_time_ms = Some(outcome.execution_time_ms);
                    result.rows = Some(outcome.rows.to_objects());
                }
                Err(e) => {
                    warn!("Generated query failed: {}", e);
                    result.explanation.push_str(" Unable to retrieve data for this query.");
                }
            }
        }
        result
    }

    /// Apply RLS for the caller and execute, through the gate when the SQL
    /// came from the model.
    async fn scope_and_run(
        &self,
        sql: &str,
        caller: &CallerContext,
        gated: bool,
    ) -> Result<ExecutionOutcome> {
        let scoped = apply_rls(sql, &caller.scope, &self.config.rls_column)?;
        if gated {
            execute_gated(&self.db, &scoped, self.config.max_result_rows).await
        } else {
            execute_trusted(&self.db, &scoped, self.config.max_result_rows).await
        }
    }

    /// Chat flow: same pipeline, plus one answer-synthesis model call folding
    /// the actual retrieved rows into a natural-language reply.
    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.cache.ensure_fresh(&self.db).await;
        let mut audit = AuditRecord::new(&req.caller.user_id, &req.message);

        let response = match intercept(&req.message) {
            Some(Interception::DirectAnswer {
                message,
                suggestions,
            }) => ChatResponse {
                suggestions,
                ..ChatResponse::plain(message)
            },
            Some(Interception::Insight { message, sql, .. }) => {
                // Interceptor already supplied the narrative; format the data
                // directly, no model call that could rewrite the numbers.
                match self.scope_and_run(&sql, &req.caller, false).await {
                    Ok(outcome) => {
                        audit.set_sql(Some(&sql));
                        audit.set_execution(outcome.rows.row_count(), outcome.execution_time_ms);
                        ChatResponse {
                            chart: suggest_chart(&req.message, &outcome.rows),
                            data: Some(serde_json::Value::Array(outcome.rows.to_objects())),
                            source_sql: Some(sql),
                            ..ChatResponse::plain(message)
                        }
                    }
                    Err(e) => {
                        warn!("Insight query failed: {}", e);
                        audit.set_sql(Some(&sql));
                        self.admit_failure(&req.message).await
                    }
                }
            }
            Some(Interception::Synthesized { sql, explanation }) => {
                match self.scope_and_run(&sql, &req.caller, false).await {
                    Ok(outcome) => {
                        audit.set_sql(Some(&sql));
                        audit.set_execution(outcome.rows.row_count(), outcome.execution_time_ms);
                        let message = self
                            .synthesize_answer(&req.message, &sql, &outcome.rows, &explanation)
                            .await;
                        ChatResponse {
                            chart: suggest_chart(&req.message, &outcome.rows),
                            data: Some(serde_json::Value::Array(outcome.rows.to_objects())),
                            source_sql: Some(sql),
                            ..ChatResponse::plain(message)
                        }
                    }
                    Err(e) => {
                        warn!("Synthesized query failed: {}", e);
                        audit.set_sql(Some(&sql));
                        self.admit_failure(&req.message).await
                    }
                }
            }
            None => self.chat_with_model(&req, &mut audit).await,
        };

        self.audit.record_detached(audit);
        Ok(response)
    }

    async fn chat_with_model(&self, req: &ChatRequest, audit: &mut AuditRecord) -> ChatResponse {
        if !self.llm.is_configured() {
            return ChatResponse::plain(NOT_CONFIGURED_MESSAGE);
        }

        let generation = self
            .generate_with_model(
                &GenerateSqlRequest {
                    question: req.message.clone(),
                    caller: req.caller.clone(),
                    execute: false,
                    history: req.history.clone(),
                },
                audit,
            )
            .await;

        let sql = match &generation.sql {
            // The model declined to produce SQL. Definitional questions are
            // answerable from the glossary, so fall through to free-form chat
            // unless the decline was itself a failure message.
            None if generation.explanation == MODEL_FAILED_MESSAGE => {
                return ChatResponse::plain(generation.explanation)
            }
            None => return self.freeform_chat(req).await,
            Some(_) if !generation.is_safe => {
                audit.set_sql(generation.sql.as_deref());
                audit.set_safety(false, generation.safety_notes.as_deref());
                return ChatResponse::plain(
                    "I generated a query for that, but it did not pass safety validation, \
                     so I did not run it. Try rephrasing the question.",
                );
            }
            Some(sql) => sql.clone(),
        };
        audit.set_sql(Some(&sql));

        match self.scope_and_run(&sql, &req.caller, true).await {
            Ok(outcome) => {
                audit.set_execution(outcome.rows.row_count(), outcome.execution_time_ms);
                let message = self
                    .synthesize_answer(&req.message, &sql, &outcome.rows, &generation.explanation)
                    .await;
                ChatResponse {
                    chart: suggest_chart(&req.message, &outcome.rows),
                    data: Some(serde_json::Value::Array(outcome.rows.to_objects())),
                    source_sql: Some(sql),
                    ..ChatResponse::plain(message)
                }
            }
            Err(e) => {
                warn!("Chat query execution failed: {}", e);
                self.admit_failure(&req.message).await
            }
        }
    }

    /// Free-form chat turn with the glossary block as context; no SQL runs.
    async fn freeform_chat(&self, req: &ChatRequest) -> ChatResponse {
        let snapshot = self.cache.snapshot();
        let mut messages = vec![ChatMessage::system(prompt::build_chat_prompt(
            snapshot.as_ref(),
        ))];
        messages.extend(req.history.iter().cloned());
        messages.push(ChatMessage::user(req.message.clone()));
        match self.llm.complete(&messages, 0.3).await {
            Ok(answer) => ChatResponse::plain(answer.trim().to_string()),
            Err(e) => {
                warn!("Free-form chat call failed: {}", e);
                ChatResponse::plain(MODEL_FAILED_MESSAGE)
            }
        }
    }

    /// The single second model call of the chat flow: the retrieved rows go
    /// into the prompt verbatim with a use-only-these-numbers instruction.
    /// Without a configured model, fall back to a deterministic rendering.
    async fn synthesize_answer(
        &self,
        question: &str,
        sql: &str,
        rows: &QueryRows,
        explanation: &str,
    ) -> String {
        if !self.llm.is_configured() {
            return render_rows_plainly(explanation, rows);
        }
        let rows_json = serde_json::to_string(&rows.to_objects()).unwrap_or_else(|_| "[]".into());
        let messages = vec![
            ChatMessage::system(prompt::build_answer_prompt(
                question,
                sql,
                &rows.columns,
                &rows_json,
            )),
            ChatMessage::user(question),
        ];
        match self.llm.complete(&messages, 0.3).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!("Answer synthesis failed, rendering rows directly: {}", e);
                render_rows_plainly(explanation, rows)
            }
        }
    }

    /// Data was needed but retrieval failed: one model call that must admit
    /// the failure, or the static apology when no model is available.
    async fn admit_failure(&self, question: &str) -> ChatResponse {
        if !self.llm.is_configured() {
            return ChatResponse::plain(RETRIEVAL_FAILED_MESSAGE);
        }
        let messages = vec![
            ChatMessage::system(prompt::build_failure_prompt(question)),
            ChatMessage::user(question),
        ];
        match self.llm.complete(&messages, 0.3).await {
            Ok(answer) => ChatResponse::plain(answer.trim().to_string()),
            Err(_) => ChatResponse::plain(RETRIEVAL_FAILED_MESSAGE),
        }
    }
}

/// Combine the gate's verdict with the model's self-reported flag. The gate
/// always wins; a disagreement is recorded in the notes so audit follow-ups
/// can see the override.
fn reconcile_safety(
    model_said_safe: bool,
    verdict: &safety::SafetyVerdict,
) -> (bool, Option<String>) {
    if model_said_safe && !verdict.safe {
        let note = format!(
            "model reported the statement as safe but the gate rejected it: {}",
            verdict.notes.clone().unwrap_or_default()
        );
        (false, Some(note))
    } else {
        (verdict.safe, verdict.notes.clone())
    }
}

/// Deterministic fallback rendering of a result set, used when no model is
/// configured or the synthesis call fails.
fn render_rows_plainly(explanation: &str, rows: &QueryRows) -> String {
    if rows.rows.is_empty() {
        return format!("{} No matching data was found.", explanation);
    }
    let mut out = format!("{}\n", explanation);
    out.push_str(&rows.columns.join(" | "));
    out.push('\n');
    for row in rows.rows.iter().take(20) {
        let rendered: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "".to_string(),
                other => other.to_string(),
            })
            .collect();
        out.push_str(&rendered.join(" | "));
        out.push('\n');
    }
    if rows.rows.len() > 20 {
        out.push_str(&format!("... and {} more rows\n", rows.rows.len() - 20));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_overrides_a_lying_self_report() {
        // Model claims a stacked statement is safe; the gate's verdict wins
        // and the override is explained in the notes.
        let verdict = safety::check("SELECT * FROM dim_vehicle; DROP TABLE dim_vehicle;");
        let (is_safe, notes) = reconcile_safety(true, &verdict);
        assert!(!is_safe);
        let notes = notes.unwrap();
        assert!(notes.contains("gate rejected"));
    }

    #[test]
    fn agreeing_safe_reports_carry_no_notes() {
        let verdict = safety::check("SELECT COUNT(*) FROM dim_vehicle");
        assert_eq!(reconcile_safety(true, &verdict), (true, None));
    }

    #[test]
    fn model_admitting_unsafe_keeps_gate_notes_verbatim() {
        let verdict = safety::check("DELETE FROM dim_vehicle");
        let (is_safe, notes) = reconcile_safety(false, &verdict);
        assert!(!is_safe);
        assert!(notes.unwrap().contains("DELETE"));
    }
}
