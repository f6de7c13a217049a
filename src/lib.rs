//! fleetiq - natural-language-to-SQL core for a multi-tenant fleet
//! reporting backend
//!
//! A question comes in with the caller's access context. The domain knowledge
//! cache is refreshed if stale, the interceptor chain gets first refusal, and
//! only unmatched questions reach the language model. Generated SQL passes an
//! independent safety gate, is rewritten for row-level security, executes with
//! a bounded result size, and every request leaves an audit record.

pub mod access;
pub mod assistant;
pub mod audit;
pub mod catalog;
pub mod chart;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod interceptors;
pub mod llm;
pub mod prompt;
pub mod rls;
pub mod safety;

pub use assistant::{Assistant, ChatRequest, ChatResponse, GenerateSqlRequest, GeneratedSqlResult};
pub use error::{AssistantError, Result};
