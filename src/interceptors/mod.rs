//! Intent interceptors
//!
//! Hand-authored pattern matchers that recognize well-understood question
//! shapes and answer them without a language-model call. Matchers run in a
//! fixed priority order; the first match wins and later matchers are never
//! consulted.

mod aggregation;
mod insights;
mod registration;

/// Outcome of a matched interceptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// Answer directly, no SQL at all (unsupported-feature redirect).
    DirectAnswer {
        message: String,
        suggestions: Vec<String>,
    },
    /// Synthesized SQL standing in for what the model would have generated.
    Synthesized { sql: String, explanation: String },
    /// Canned analytical insight: a message plus a hand-authored query whose
    /// results back it. Hand-authored SQL skips the safety gate but is still
    /// RLS-rewritten.
    Insight {
        message: String,
        sql: String,
        explanation: String,
    },
}

type Matcher = fn(&str) -> Option<Interception>;

/// Priority order is part of the contract: registration-expiry must win over
/// the aggregation pattern, and the insight handlers come after both.
const CHAIN: &[Matcher] = &[
    registration::try_match,
    aggregation::try_match,
    insights::try_match_maintenance,
    insights::try_match_service_cost,
    insights::try_match_book_value,
    insights::try_match_contract_expiry,
];

/// Run the interceptor chain over a user question. Returns None when no
/// pattern matches and the language-model path should be taken.
pub fn intercept(question: &str) -> Option<Interception> {
    let normalized = question.trim().to_lowercase();
    CHAIN.iter().find_map(|matcher| matcher(&normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_wins_over_aggregation() {
        // Matches both the registration keyword set and "vehicles by ..."
        let result = intercept("registration expiry for vehicles by status").unwrap();
        assert!(matches!(result, Interception::DirectAnswer { .. }));
    }

    #[test]
    fn unmatched_question_falls_through() {
        assert!(intercept("what is the average monthly rental in Belgium?").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(intercept("Vehicles BY Status").is_some());
    }
}
