//! Prompt assembly for the SQL-generation and chat model calls

use crate::access::CallerContext;
use crate::catalog::static_block::{STATIC_CHAT_DOMAIN_BLOCK, STATIC_SQL_DOMAIN_BLOCK};
use crate::catalog::KnowledgeSnapshot;
use crate::config::SqlDialect;
use crate::llm::ChatMessage;
use std::sync::Arc;

fn dialect_guidance(dialect: SqlDialect) -> &'static str {
    match dialect {
        SqlDialect::Sqlite => {
            "Date arithmetic: use date('now'), date('now', '+1 month'), \
             strftime('%Y-%m', col). There is no INTERVAL syntax."
        }
        SqlDialect::Postgres => {
            "Date arithmetic: use CURRENT_DATE, CURRENT_DATE + INTERVAL '1 month', \
             date_trunc('month', col). Do not use strftime."
        }
    }
}

/// The fixed rule list. Hand-authored, not learned; numbering is referenced in
/// audit follow-ups, so keep it stable.
fn numbered_rules(max_rows: usize, dialect: SqlDialect) -> String {
    format!(
        r#"RULES:
1. Generate exactly one read-only SELECT statement. Never INSERT, UPDATE, DELETE, DROP, ALTER, TRUNCATE, MERGE or EXEC.
2. Use bare table names exactly as listed in the schema; do not invent schemas or databases.
3. Always end with LIMIT {max_rows} unless the question asks for a single aggregate value.
4. Only reference tables and columns that appear in the schema section.
5. Vehicle status values are 'Active', 'Terminated', 'In Stock', 'Sold'; compare as strings.
6. is_active is 1/0; use is_active = 1 for "active" filters.
7. Lease types are the codes FL, NL, ST.
8. {dialect_dates}
9. Prefer pre-built view_ tables over joining base tables when one covers the question.
10. Every joined table MUST have an alias, and every column in a join query MUST be alias-qualified.
11. Use explicit JOIN ... ON syntax; never comma joins.
12. For "by", "per" or "breakdown" phrasing, aggregate with GROUP BY and order by the aggregate descending.
13. Questions about contracts or leases expiring or ending MUST use expected_end_date and months_remaining. NEVER use lease_end_date; it is stale.
14. Format money columns as plain numbers; do not concatenate currency symbols in SQL.
15. When counting distinct entities, use COUNT(DISTINCT key_column), not COUNT(*) over a join.
16. If the question cannot be answered from the schema, set sql to null and explain why.
17. Set is_safe to false if you had to generate anything other than a single SELECT."#,
        max_rows = max_rows,
        dialect_dates = dialect_guidance(dialect)
    )
}

/// Build the system prompt for the SQL-generation model call.
pub fn build_sql_prompt(
    snapshot: Option<&Arc<KnowledgeSnapshot>>,
    dialect: SqlDialect,
    caller: &CallerContext,
    max_rows: usize,
) -> String {
    let (domain_block, schema_digest) = match snapshot {
        Some(s) => (s.sql_block.as_str(), s.schema_digest.as_str()),
        None => (STATIC_SQL_DOMAIN_BLOCK, ""),
    };

    let rules = numbered_rules(max_rows, dialect);

    let mut prompt = format!(
        "You are a SQL generator for a fleet reporting database running on {dialect}.\n\n",
        dialect = dialect.as_str()
    );
    if !schema_digest.is_empty() {
        prompt.push_str("SCHEMA (structure only):\n");
        prompt.push_str(schema_digest);
        prompt.push('\n');
    }
    prompt.push_str("DOMAIN KNOWLEDGE:\n");
    prompt.push_str(domain_block);
    prompt.push_str("\n\n");
    prompt.push_str(&rules);
    prompt.push_str(&format!(
        "\n\nCALLER: role '{role}' (level {level}), scope: {scope}. \
         Row-level filtering is enforced server-side; do not add customer filters yourself.\n",
        role = caller.role_name,
        level = caller.role_level,
        scope = caller.scope_summary(),
    ));
    prompt.push_str(
        r#"
RESPONSE FORMAT: return ONLY a JSON object with exactly these keys:
{"sql": "SELECT ..." or null, "explanation": "...", "is_safe": true/false}
No markdown, no code fences, no other text."#,
    );
    prompt
}

/// System prompt for the chat answer call: fold actual retrieved rows into a
/// natural-language answer without inventing numbers.
pub fn build_answer_prompt(
    question: &str,
    sql: &str,
    columns: &[String],
    rows_json: &str,
) -> String {
    format!(
        r#"You are a fleet reporting assistant. Answer the user's question from the query results below.

USER QUESTION: "{question}"

SQL EXECUTED:
{sql}

COLUMNS: {columns}
RESULT ROWS (JSON):
{rows}

INSTRUCTIONS:
1. Use ONLY the numbers and values in the result rows. Never invent, estimate or extrapolate figures.
2. Answer directly and conversationally; round large money amounts sensibly.
3. If the rows are empty, say that no matching data was found and do not guess what it might have been.
4. Do not mention SQL, tables or columns unless the user asked about them."#,
        question = question,
        sql = sql,
        columns = columns.join(", "),
        rows = rows_json,
    )
}

/// System prompt used when data retrieval failed: the model must admit the
/// failure rather than fabricate a substitute answer.
pub fn build_failure_prompt(question: &str) -> String {
    format!(
        r#"You are a fleet reporting assistant. The user asked:

"{question}"

The data retrieval for this question FAILED. You have no data.

Apologize briefly, state plainly that you could not retrieve the data, and suggest the user try again or rephrase. You MUST NOT invent any numbers, examples or partial answers."#,
        question = question,
    )
}

/// System prompt for free-form chat turns that need domain context but no SQL.
pub fn build_chat_prompt(snapshot: Option<&Arc<KnowledgeSnapshot>>) -> String {
    let chat_block = snapshot
        .map(|s| s.chat_block.as_str())
        .unwrap_or(STATIC_CHAT_DOMAIN_BLOCK);
    format!(
        "You are a helpful fleet reporting assistant. Use this context about the \
         reporting database when relevant:\n\n{}\n\nBe concise and concrete.",
        chat_block
    )
}

/// Assemble the message list for the SQL-generation call: system prompt, a
/// bounded window of prior turns, then the current question.
pub fn sql_generation_messages(
    system_prompt: String,
    history: &[ChatMessage],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(question));
    messages
}
