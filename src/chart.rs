//! Chart suggestion heuristic
//!
//! Inspects the shape of a result set and proposes a chart type and axis
//! mapping. Best effort only; anything ambiguous returns None and the caller
//! falls back to a plain table.

use crate::db::QueryRows;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartConfig {
    pub chart_type: String,
    pub x_axis_key: String,
    pub y_axis_keys: Vec<String>,
    pub title: String,
}

fn is_numeric_column(rows: &QueryRows, idx: usize) -> bool {
    let mut saw_number = false;
    for row in &rows.rows {
        match row.get(idx) {
            Some(serde_json::Value::Number(_)) => saw_number = true,
            Some(serde_json::Value::Null) => {}
            _ => return false,
        }
    }
    saw_number
}

fn is_date_like(value: &serde_json::Value) -> bool {
    value
        .as_str()
        .map(|s| {
            let bytes = s.as_bytes();
            s.len() >= 7
                && bytes[0].is_ascii_digit()
                && bytes[1].is_ascii_digit()
                && bytes[2].is_ascii_digit()
                && bytes[3].is_ascii_digit()
                && bytes[4] == b'-'
        })
        .unwrap_or(false)
}

/// Propose a chart for a result set: one categorical (or date) column plus at
/// least one numeric column.
pub fn suggest_chart(question: &str, rows: &QueryRows) -> Option<ChartConfig> {
    if rows.rows.len() < 2 || rows.columns.len() < 2 {
        return None;
    }

    let numeric: Vec<usize> = (0..rows.columns.len())
        .filter(|&i| is_numeric_column(rows, i))
        .collect();
    if numeric.is_empty() || numeric.contains(&0) {
        return None;
    }

    let x_axis_key = rows.columns[0].clone();
    let y_axis_keys: Vec<String> = numeric.iter().map(|&i| rows.columns[i].clone()).collect();

    let first_is_date = rows
        .rows
        .iter()
        .all(|r| r.first().map(is_date_like).unwrap_or(false));

    let chart_type = if first_is_date {
        "line"
    } else if rows.rows.len() <= 6 && y_axis_keys.len() == 1 {
        "pie"
    } else if rows.rows.len() <= 12 {
        "bar"
    } else {
        return None;
    };

    let trimmed = question.trim().trim_end_matches(['?', '.', '!']);
    let mut chars = trimmed.chars();
    let title = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };

    Some(ChartConfig {
        chart_type: chart_type.to_string(),
        x_axis_key,
        y_axis_keys,
        title,
    })
}
