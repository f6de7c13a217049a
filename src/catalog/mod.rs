//! Domain knowledge cache
//!
//! Renders the semantic catalog (tables, columns, relationships, glossary)
//! into the text blocks injected into language-model prompts, and caches the
//! result process-wide with a TTL. The refresh is build-then-swap: readers
//! always see either the previous complete snapshot or the new one, never a
//! half-built cache.

pub mod repo;
pub mod static_block;

use crate::db::Database;
use crate::error::Result;
use repo::CatalogData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One immutable rendering of the semantic catalog.
#[derive(Debug)]
pub struct KnowledgeSnapshot {
    /// Domain block for SQL-generation prompts.
    pub sql_block: String,
    /// Glossary digest for free-form chat prompts.
    pub chat_block: String,
    /// Structural table/column digest (names only, no semantics).
    pub schema_digest: String,
}

struct CacheState {
    refreshed_at: Option<Instant>,
    snapshot: Option<Arc<KnowledgeSnapshot>>,
}

/// TTL-cached knowledge snapshot shared across concurrent requests.
///
/// Two requests observing a stale cache at the same time may both rebuild it;
/// the rebuild is idempotent, so the race is accepted rather than serialized
/// behind a lock.
pub struct KnowledgeCache {
    ttl: Duration,
    state: RwLock<CacheState>,
    refreshes: AtomicU64,
}

impl KnowledgeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState {
                refreshed_at: None,
                snapshot: None,
            }),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Refresh the snapshot if it is older than the TTL. Idempotent and safe
    /// to call on every request; a fresh cache makes this side-effect-free.
    ///
    /// Catalog query failures leave the existing snapshot in place: a stale
    /// knowledge block is better than an unavailable assistant.
    pub async fn ensure_fresh(&self, db: &Database) {
        if self.is_fresh() {
            return;
        }
        match repo::load_catalog(db).await {
            Ok(data) if data.tables.is_empty() => {
                // Catalog not provisioned. Stamp the refresh anyway so we do
                // not re-query on every request; callers fall back to the
                // compiled-in block.
                info!("Semantic catalog is empty; using static domain knowledge");
                let mut state = self.state.write().unwrap();
                state.snapshot = None;
                state.refreshed_at = Some(Instant::now());
                self.refreshes.fetch_add(1, Ordering::Relaxed);
            }
            Ok(data) => {
                let snapshot = Arc::new(render_snapshot(&data));
                info!(
                    tables = data.tables.len(),
                    columns = data.columns.len(),
                    glossary = data.glossary.len(),
                    "Refreshed domain knowledge cache"
                );
                let mut state = self.state.write().unwrap();
                state.snapshot = Some(snapshot);
                state.refreshed_at = Some(Instant::now());
                self.refreshes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Catalog refresh failed, serving previous snapshot: {}", e);
            }
        }
    }

    fn is_fresh(&self) -> bool {
        let state = self.state.read().unwrap();
        state
            .refreshed_at
            .map(|t| t.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    /// Current snapshot, if the catalog is provisioned.
    pub fn snapshot(&self) -> Option<Arc<KnowledgeSnapshot>> {
        self.state.read().unwrap().snapshot.clone()
    }

    /// Number of completed refresh passes (observability; also lets tests
    /// assert the TTL no-op behavior).
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

/// Render both prompt blocks and the structural digest from catalog data.
fn render_snapshot(data: &CatalogData) -> KnowledgeSnapshot {
    KnowledgeSnapshot {
        sql_block: render_sql_block(data),
        chat_block: render_chat_block(data),
        schema_digest: render_schema_digest(data),
    }
}

fn render_sql_block(data: &CatalogData) -> String {
    let mut out = String::new();

    out.push_str("TABLES:\n");
    for table in &data.tables {
        out.push_str(&format!("\n{} - {}\n", table.name, table.description));
        for col in data.columns.iter().filter(|c| c.table_name == table.name) {
            let mut flags = Vec::new();
            if col.is_key {
                flags.push("KEY");
            }
            if col.is_measure {
                flags.push("MEASURE");
            }
            let flag_str = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(","))
            };
            let examples = col
                .example_values
                .as_deref()
                .map(|v| format!(" e.g. {}", v))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {} ({}){} - {}{}\n",
                col.column_name, col.data_type, flag_str, col.description, examples
            ));
        }
    }

    if !data.relationships.is_empty() {
        out.push_str("\nRELATIONSHIPS:\n");
        for rel in &data.relationships {
            out.push_str(&format!(
                "  {}.{} -> {}.{} ({}) - {}\n",
                rel.from_table,
                rel.from_column,
                rel.to_table,
                rel.to_column,
                rel.relationship_type,
                rel.description
            ));
        }
    }

    out.push('\n');
    out.push_str(static_block::BUSINESS_RULES);

    // Pre-built reporting views, if the catalog carries any.
    let views: Vec<_> = data
        .tables
        .iter()
        .filter(|t| t.name.starts_with("view_"))
        .collect();
    if !views.is_empty() {
        out.push_str("\n\nPRE-BUILT VIEWS (prefer these over joining base tables):\n");
        for view in views {
            out.push_str(&format!("  {} - {}\n", view.name, view.description));
        }
    }

    out
}

fn render_chat_block(data: &CatalogData) -> String {
    let mut out = String::new();

    if !data.glossary.is_empty() {
        out.push_str("GLOSSARY:\n");
        for term in &data.glossary {
            out.push_str(&format!("  {} - {}", term.term, term.definition));
            if let Some(syn) = &term.synonyms {
                out.push_str(&format!(" (also: {})", syn));
            }
            if let Some(calc) = &term.calculation {
                out.push_str(&format!(" [calculated as: {}]", calc));
            }
            out.push('\n');
        }
    }

    out.push_str("\nAVAILABLE DATA:\n");
    for table in &data.tables {
        out.push_str(&format!("  {} - {}", table.name, table.description));
        if let Some(q) = &table.example_questions {
            out.push_str(&format!(" (example questions: {})", q));
        }
        out.push('\n');
    }

    out
}

fn render_schema_digest(data: &CatalogData) -> String {
    let mut out = String::new();
    for table in &data.tables {
        let cols: Vec<&str> = data
            .columns
            .iter()
            .filter(|c| c.table_name == table.name)
            .map(|c| c.column_name.as_str())
            .collect();
        out.push_str(&format!("{}({})\n", table.name, cols.join(", ")));
    }
    out
}
