//! Canned analytical insight handlers
//!
//! Each handler recognizes its own phrase set and pairs a message with a
//! hand-authored query. These queries never came from a model, so they skip
//! the safety gate; they are still RLS-rewritten before execution.

use super::Interception;

fn contains_any(query: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| query.contains(k))
}

pub fn try_match_maintenance(query: &str) -> Option<Interception> {
    if !query.contains("maintenance") {
        return None;
    }
    if !contains_any(
        query,
        &["insight", "overview", "summary", "analysis", "trend", "breakdown"],
    ) {
        return None;
    }
    Some(Interception::Insight {
        message: "Here is a maintenance overview by manufacturer: event counts and \
                  total spend, highest spend first."
            .to_string(),
        // Derived table keeps customer_id out of the join's left side so an
        // injected RLS predicate resolves unambiguously.
        sql: "SELECT v.make_name, COUNT(*) AS service_events, \
              SUM(m.service_cost) AS total_cost, AVG(m.service_cost) AS avg_cost \
              FROM (SELECT vehicle_id, service_cost FROM fact_maintenance) m \
              JOIN dim_vehicle v ON v.vehicle_id = m.vehicle_id \
              GROUP BY v.make_name ORDER BY total_cost DESC"
            .to_string(),
        explanation: "Maintenance events and spend aggregated per manufacturer.".to_string(),
    })
}

pub fn try_match_service_cost(query: &str) -> Option<Interception> {
    if !contains_any(
        query,
        &["service cost", "servicing cost", "repair cost", "maintenance cost"],
    ) {
        return None;
    }
    Some(Interception::Insight {
        message: "These are the vehicles with the highest total service cost.".to_string(),
        sql: "SELECT v.registration_number, v.make_name, v.model_name, \
              SUM(m.service_cost) AS total_service_cost, COUNT(*) AS service_events \
              FROM (SELECT vehicle_id, service_cost FROM fact_maintenance) m \
              JOIN dim_vehicle v ON v.vehicle_id = m.vehicle_id \
              GROUP BY v.registration_number, v.make_name, v.model_name \
              ORDER BY total_service_cost DESC"
            .to_string(),
        explanation: "Total service cost per vehicle, most expensive first.".to_string(),
    })
}

pub fn try_match_book_value(query: &str) -> Option<Interception> {
    if !contains_any(query, &["book value", "asset value", "fleet value"]) {
        return None;
    }
    Some(Interception::Insight {
        message: "Current book value of the active fleet by manufacturer.".to_string(),
        sql: "SELECT make_name, COUNT(*) AS vehicles_count, \
              SUM(book_value) AS total_book_value \
              FROM dim_vehicle WHERE is_active = 1 \
              GROUP BY make_name ORDER BY total_book_value DESC"
            .to_string(),
        explanation: "Active-fleet book value aggregated per manufacturer.".to_string(),
    })
}

pub fn try_match_contract_expiry(query: &str) -> Option<Interception> {
    let mentions_contract = contains_any(query, &["contract", "lease"]);
    let mentions_expiry = contains_any(query, &["expir", "ending", "end soon", "due to end", "renewal"]);
    if !(mentions_contract && mentions_expiry) {
        return None;
    }
    // expected_end_date / months_remaining, never the stale lease_end_date.
    Some(Interception::Insight {
        message: "Contracts ending within the next three months, soonest first.".to_string(),
        sql: "SELECT contract_number, customer_name, expected_end_date, months_remaining \
              FROM dim_contract \
              WHERE is_active = 1 AND months_remaining BETWEEN 0 AND 3 \
              ORDER BY months_remaining ASC, expected_end_date ASC"
            .to_string(),
        explanation: "Active contracts with three or fewer months remaining.".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maintenance_needs_an_analysis_word() {
        assert!(try_match_maintenance("maintenance summary please").is_some());
        assert!(try_match_maintenance("when is my next maintenance").is_none());
    }

    #[test]
    fn service_cost_matches_maintenance_cost_phrase() {
        assert!(try_match_service_cost("what is our maintenance cost").is_some());
    }

    #[test]
    fn book_value_query_filters_active_fleet() {
        match try_match_book_value("total book value of the fleet").unwrap() {
            Interception::Insight { sql, .. } => assert!(sql.contains("is_active = 1")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn contract_expiry_uses_expected_end_date() {
        match try_match_contract_expiry("which contracts are expiring soon").unwrap() {
            Interception::Insight { sql, .. } => {
                assert!(sql.contains("expected_end_date"));
                assert!(sql.contains("months_remaining"));
                assert!(!sql.contains("lease_end_date"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn contract_alone_is_not_enough() {
        assert!(try_match_contract_expiry("how many contracts do we have").is_none());
    }
}
