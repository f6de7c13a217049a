//! Loading the semantic catalog relations

use crate::db::{Database, QueryRows};
use crate::error::Result;

/// Upper bound on catalog rows read per relation in one refresh pass.
const CATALOG_ROW_CAP: usize = 5000;

#[derive(Debug, Clone)]
pub struct CatalogTable {
    pub name: String,
    pub description: String,
    pub example_questions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogColumn {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub description: String,
    pub is_key: bool,
    pub is_measure: bool,
    pub example_values: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogRelationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub relationship_type: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct GlossaryTerm {
    pub term: String,
    pub definition: String,
    pub synonyms: Option<String>,
    pub calculation: Option<String>,
}

/// Everything one refresh pass reads.
#[derive(Debug, Clone, Default)]
pub struct CatalogData {
    pub tables: Vec<CatalogTable>,
    pub columns: Vec<CatalogColumn>,
    pub relationships: Vec<CatalogRelationship>,
    pub glossary: Vec<GlossaryTerm>,
}

fn str_at(rows: &QueryRows, row: &[serde_json::Value], name: &str) -> String {
    rows.columns
        .iter()
        .position(|c| c == name)
        .and_then(|i| row.get(i))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn opt_str_at(rows: &QueryRows, row: &[serde_json::Value], name: &str) -> Option<String> {
    let s = str_at(rows, row, name);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn flag_at(rows: &QueryRows, row: &[serde_json::Value], name: &str) -> bool {
    rows.columns
        .iter()
        .position(|c| c == name)
        .and_then(|i| row.get(i))
        .map(|v| match v {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        })
        .unwrap_or(false)
}

/// Load all four catalog relations in one pass.
pub async fn load_catalog(db: &Database) -> Result<CatalogData> {
    let table_rows = db
        .fetch_rows(
            "SELECT table_name, description, example_questions \
             FROM semantic_tables ORDER BY table_name",
            CATALOG_ROW_CAP,
        )
        .await?;
    let tables: Vec<CatalogTable> = table_rows
        .rows
        .iter()
        .map(|r| CatalogTable {
            name: str_at(&table_rows, r, "table_name"),
            description: str_at(&table_rows, r, "description"),
            example_questions: opt_str_at(&table_rows, r, "example_questions"),
        })
        .collect();

    // Catalog not provisioned: skip the remaining relations entirely.
    if tables.is_empty() {
        return Ok(CatalogData::default());
    }

    let column_rows = db
        .fetch_rows(
            "SELECT table_name, column_name, data_type, description, \
                    is_key, is_measure, example_values \
             FROM semantic_columns ORDER BY table_name, column_name",
            CATALOG_ROW_CAP,
        )
        .await?;
    let columns = column_rows
        .rows
        .iter()
        .map(|r| CatalogColumn {
            table_name: str_at(&column_rows, r, "table_name"),
            column_name: str_at(&column_rows, r, "column_name"),
            data_type: str_at(&column_rows, r, "data_type"),
            description: str_at(&column_rows, r, "description"),
            is_key: flag_at(&column_rows, r, "is_key"),
            is_measure: flag_at(&column_rows, r, "is_measure"),
            example_values: opt_str_at(&column_rows, r, "example_values"),
        })
        .collect();

    let rel_rows = db
        .fetch_rows(
            "SELECT from_table, from_column, to_table, to_column, \
                    relationship_type, description \
             FROM semantic_relationships ORDER BY from_table",
            CATALOG_ROW_CAP,
        )
        .await?;
    let relationships = rel_rows
        .rows
        .iter()
        .map(|r| CatalogRelationship {
            from_table: str_at(&rel_rows, r, "from_table"),
            from_column: str_at(&rel_rows, r, "from_column"),
            to_table: str_at(&rel_rows, r, "to_table"),
            to_column: str_at(&rel_rows, r, "to_column"),
            relationship_type: str_at(&rel_rows, r, "relationship_type"),
            description: str_at(&rel_rows, r, "description"),
        })
        .collect();

    let glossary_rows = db
        .fetch_rows(
            "SELECT term, definition, synonyms, calculation \
             FROM semantic_glossary ORDER BY term",
            CATALOG_ROW_CAP,
        )
        .await?;
    let glossary = glossary_rows
        .rows
        .iter()
        .map(|r| GlossaryTerm {
            term: str_at(&glossary_rows, r, "term"),
            definition: str_at(&glossary_rows, r, "definition"),
            synonyms: opt_str_at(&glossary_rows, r, "synonyms"),
            calculation: opt_str_at(&glossary_rows, r, "calculation"),
        })
        .collect();

    Ok(CatalogData {
        tables,
        columns,
        relationships,
        glossary,
    })
}
