//! Language-model client
//!
//! OpenAI-compatible chat-completions client with an explicit request timeout
//! and at most one jittered retry. Provider errors never reach end users;
//! callers map `AssistantError::Llm` to an apologetic message.

use crate::config::LlmConfig;
use crate::error::{AssistantError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// What the SQL-generation call must return: a JSON object with exactly these
/// keys. `is_safe` is the model's self-report; the safety gate re-checks it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSqlResponse {
    pub sql: Option<String>,
    pub explanation: String,
    pub is_safe: bool,
}

#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AssistantError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    /// Whether credentials are provisioned. When false, flows return an
    /// "assistant not configured" message instead of calling out.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// One chat-completion round trip, with a single jittered retry on
    /// transport errors when enabled.
    pub async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AssistantError::Config("no language-model API key provisioned".into()))?;

        match self.call_once(api_key, messages, temperature).await {
            Ok(content) => Ok(content),
            Err(e) if self.config.retry_once => {
                let jitter = rand::thread_rng().gen_range(200..800);
                warn!("Model call failed ({}), retrying once after {}ms", e, jitter);
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                self.call_once(api_key, messages, temperature).await
            }
            Err(e) => Err(e),
        }
    }

    /// SQL-generation call: strict JSON contract, markdown fences tolerated.
    /// Malformed JSON is a model-call failure, never a panic.
    pub async fn generate_sql(&self, messages: &[ChatMessage]) -> Result<LlmSqlResponse> {
        let raw = self.complete(messages, 0.1).await?;
        let cleaned = strip_code_fences(&raw);
        serde_json::from_str::<LlmSqlResponse>(cleaned).map_err(|e| {
            AssistantError::Llm(format!(
                "model returned malformed SQL response JSON: {} (response: {})",
                e,
                cleaned.chars().take(200).collect::<String>()
            ))
        })
    }

    async fn call_once(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": temperature,
        });

        debug!(model = %self.config.model, messages = messages.len(), "Calling language model");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Llm(format!("model call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistantError::Llm(format!(
                "model endpoint returned {}",
                status
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AssistantError::Llm(format!("invalid model response body: {}", e)))?;

        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AssistantError::Llm("no content in model response".to_string()))
    }
}

/// Strip markdown code fences models wrap JSON in despite instructions.
pub fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        let raw = "```json\n{\"sql\": null, \"explanation\": \"x\", \"is_safe\": true}\n```";
        let parsed: LlmSqlResponse = serde_json::from_str(strip_code_fences(raw)).unwrap();
        assert!(parsed.sql.is_none());
        assert!(parsed.is_safe);
    }

    #[test]
    fn plain_json_passes_through() {
        let raw = r#"{"sql": "SELECT 1", "explanation": "one", "is_safe": true}"#;
        let parsed: LlmSqlResponse = serde_json::from_str(strip_code_fences(raw)).unwrap();
        assert_eq!(parsed.sql.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn unconfigured_client_reports_it() {
        let client = LlmClient::new(crate::config::LlmConfig {
            api_key: None,
            base_url: "http://localhost".to_string(),
            model: "test".to_string(),
            request_timeout: Duration::from_secs(1),
            retry_once: false,
        })
        .unwrap();
        assert!(!client.is_configured());
    }
}
