//! "X by Y" aggregation interceptor
//!
//! The single most common analytical question shape. Synthesizing the GROUP
//! BY directly skips a model round trip and removes column-name hallucination
//! for a shape we fully understand. Unresolvable dimension words fall through
//! to the language-model path rather than guessing.

use super::Interception;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BY_PATTERN: Regex = Regex::new(
        r"(?:(?:count|number)\s+of\s+)?(active\s+)?(vehicles?|cars?|fleet|contracts?|leases?)\s+(?:breakdown\s+)?by\s+([a-z][a-z_ ]*?)[\s?.!]*$"
    )
    .expect("aggregation pattern is valid");
}

struct Entity {
    table: &'static str,
    label: &'static str,
}

fn resolve_entity(word: &str) -> Entity {
    if word.starts_with("contract") || word.starts_with("lease") {
        Entity {
            table: "dim_contract",
            label: "contracts",
        }
    } else {
        Entity {
            table: "dim_vehicle",
            label: "vehicles",
        }
    }
}

/// Map a free-text dimension word onto a real column of the entity table.
fn resolve_dimension(entity: &Entity, word: &str) -> Option<&'static str> {
    let word = word.trim();
    match entity.table {
        "dim_vehicle" => match word {
            "manufacturer" | "make" | "brand" => Some("make_name"),
            "model" => Some("model_name"),
            "status" | "state" => Some("vehicle_status"),
            "fuel" | "fuel type" => Some("fuel_type"),
            "year" | "model year" => Some("model_year"),
            "customer" | "client" => Some("customer_id"),
            _ => None,
        },
        "dim_contract" => match word {
            "lease type" | "type" => Some("lease_type"),
            "customer" | "client" => Some("customer_name"),
            "status" | "state" => Some("is_active"),
            _ => None,
        },
        _ => None,
    }
}

pub fn try_match(query: &str) -> Option<Interception> {
    let caps = BY_PATTERN.captures(query)?;
    let active_only = caps.get(1).is_some();
    let entity = resolve_entity(caps.get(2)?.as_str());
    let dimension_word = caps.get(3)?.as_str();
    let column = resolve_dimension(&entity, dimension_word)?;

    let where_clause = if active_only {
        " WHERE is_active = 1"
    } else {
        ""
    };
    let alias = format!("{}_count", entity.label);
    let sql = format!(
        "SELECT {col}, COUNT(*) AS {alias} FROM {table}{where_clause} GROUP BY {col} ORDER BY {alias} DESC",
        col = column,
        alias = alias,
        table = entity.table,
        where_clause = where_clause,
    );
    Some(Interception::Synthesized {
        sql,
        explanation: format!(
            "Counts {} grouped by {}, largest group first.",
            entity.label, dimension_word.trim()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_of(query: &str) -> String {
        match try_match(query) {
            Some(Interception::Synthesized { sql, .. }) => sql,
            other => panic!("expected synthesized SQL for {:?}, got {:?}", query, other),
        }
    }

    #[test]
    fn vehicles_by_status() {
        assert_eq!(
            sql_of("vehicles by status"),
            "SELECT vehicle_status, COUNT(*) AS vehicles_count FROM dim_vehicle \
             GROUP BY vehicle_status ORDER BY vehicles_count DESC"
        );
    }

    #[test]
    fn count_of_vehicles_by_manufacturer() {
        assert_eq!(
            sql_of("count of vehicles by manufacturer"),
            "SELECT make_name, COUNT(*) AS vehicles_count FROM dim_vehicle \
             GROUP BY make_name ORDER BY vehicles_count DESC"
        );
    }

    #[test]
    fn active_qualifier_adds_filter() {
        let sql = sql_of("number of active vehicles by fuel type");
        assert!(sql.contains("WHERE is_active = 1"));
        assert!(sql.contains("GROUP BY fuel_type"));
    }

    #[test]
    fn breakdown_phrasing() {
        let sql = sql_of("contracts breakdown by lease type");
        assert!(sql.starts_with("SELECT lease_type, COUNT(*) AS contracts_count FROM dim_contract"));
    }

    #[test]
    fn unknown_dimension_falls_through() {
        assert!(try_match("vehicles by favourite colour").is_none());
    }

    #[test]
    fn trailing_question_mark_is_tolerated() {
        assert!(try_match("how many vehicles by status?").is_some());
    }
}
