//! Registration-expiry redirect
//!
//! The data model has no registration-renewal field. Without this redirect
//! the language model reliably confuses registration expiry with contract
//! expiry and fabricates a column.

use super::Interception;

const KEYWORDS: &[&str] = &[
    "registration expir",
    "registration renewal",
    "registration due",
    "plate renewal",
    "plate expir",
    "license plate expir",
    "licence plate expir",
    "rego expir",
    "rego renewal",
];

pub fn try_match(query: &str) -> Option<Interception> {
    if !KEYWORDS.iter().any(|k| query.contains(k)) {
        return None;
    }
    Some(Interception::DirectAnswer {
        message: "Vehicle registration renewal dates are not tracked in the fleet \
                  reporting database, so I can't answer registration-expiry questions. \
                  I can tell you about contract and lease expiry instead: contracts \
                  carry an expected end date and a months-remaining figure."
            .to_string(),
        suggestions: vec![
            "Which contracts expire in the next 3 months?".to_string(),
            "Show contracts by months remaining".to_string(),
            "How many active contracts do we have?".to_string(),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keyword_variants() {
        for q in [
            "when does my registration expire",
            "registration expiry next month",
            "plate renewal dates",
            "is my rego expiring soon",
        ] {
            assert!(try_match(q).is_some(), "should match: {}", q);
        }
    }

    #[test]
    fn returns_three_suggestions_and_mentions_contracts() {
        match try_match("registration expiry next month").unwrap() {
            Interception::DirectAnswer {
                message,
                suggestions,
            } => {
                assert_eq!(suggestions.len(), 3);
                assert!(message.contains("contract"));
            }
            other => panic!("unexpected interception: {:?}", other),
        }
    }

    #[test]
    fn ignores_contract_expiry_questions() {
        assert!(try_match("which contracts expire next month").is_none());
    }
}
