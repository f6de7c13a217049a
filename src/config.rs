//! Environment-driven configuration for the assistant core

use crate::error::{AssistantError, Result};
use std::time::Duration;

/// SQL dialect of the active reporting database.
///
/// The prompt assembler emits dialect-appropriate date arithmetic, so this is
/// a configuration input rather than something inferred from generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
}

impl SqlDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "SQLite",
            SqlDialect::Postgres => "PostgreSQL",
        }
    }

    /// Infer the dialect from a database URL scheme.
    pub fn from_database_url(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Ok(SqlDialect::Sqlite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(SqlDialect::Postgres)
        } else {
            Err(AssistantError::Config(format!(
                "Unsupported database URL scheme: {}",
                url
            )))
        }
    }
}

/// Language-model endpoint configuration.
///
/// `api_key = None` means the assistant feature is not provisioned; flows
/// return a clear "not configured" message instead of attempting a call.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
    pub retry_once: bool,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: std::env::var("FLEETIQ_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("FLEETIQ_LLM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            retry_once: std::env::var("FLEETIQ_LLM_RETRY")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
        }
    }
}

/// Assistant-wide settings.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub llm: LlmConfig,
    /// Default cap on rows returned by any executed query.
    pub max_result_rows: usize,
    /// How long a knowledge cache snapshot stays fresh.
    pub catalog_ttl: Duration,
    /// Column the RLS rewriter scopes on.
    pub rls_column: String,
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self {
            llm: LlmConfig::from_env(),
            max_result_rows: std::env::var("FLEETIQ_MAX_ROWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            catalog_ttl: Duration::from_secs(
                std::env::var("FLEETIQ_CATALOG_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
            rls_column: std::env::var("FLEETIQ_RLS_COLUMN")
                .unwrap_or_else(|_| "customer_id".to_string()),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                request_timeout: Duration::from_secs(30),
                retry_once: true,
            },
            max_result_rows: 1000,
            catalog_ttl: Duration::from_secs(3600),
            rls_column: "customer_id".to_string(),
        }
    }
}
