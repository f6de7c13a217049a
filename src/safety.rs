//! SQL safety gate
//!
//! Independent, deterministic check that a statement is a single read-only
//! SELECT. The language model also self-reports a safety flag; the gate never
//! trusts it. Two layers: a lexical whole-word keyword screen (catches
//! forbidden verbs anywhere, including inside subqueries or trailing
//! statements), and a real parse requiring exactly one query statement.

use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

lazy_static! {
    static ref FORBIDDEN: Regex = Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|truncate|merge|exec|execute|grant|revoke|create)\b"
    )
    .expect("forbidden keyword pattern is valid");
}

/// Verdict of the gate. `safe == false` is a normal result state, not an
/// error: callers must branch on it and never execute the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub notes: Option<String>,
}

impl SafetyVerdict {
    fn safe() -> Self {
        Self {
            safe: true,
            notes: None,
        }
    }

    fn unsafe_because(note: impl Into<String>) -> Self {
        Self {
            safe: false,
            notes: Some(note.into()),
        }
    }
}

/// Check a SQL string for read-only safety.
pub fn check(sql: &str) -> SafetyVerdict {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return SafetyVerdict::unsafe_because("empty statement");
    }

    if let Some(m) = FORBIDDEN.find(trimmed) {
        return SafetyVerdict::unsafe_because(format!(
            "forbidden keyword '{}' in statement",
            m.as_str().to_uppercase()
        ));
    }

    // Statement separators mean more than one statement, whatever follows.
    if trimmed.trim_end_matches(';').contains(';') {
        return SafetyVerdict::unsafe_because("multiple statements are not allowed");
    }

    let statements = match Parser::parse_sql(&GenericDialect {}, trimmed) {
        Ok(s) => s,
        Err(e) => return SafetyVerdict::unsafe_because(format!("statement does not parse: {}", e)),
    };
    match statements.as_slice() {
        [Statement::Query(_)] => SafetyVerdict::safe(),
        [_] => SafetyVerdict::unsafe_because("only SELECT statements may execute"),
        _ => SafetyVerdict::unsafe_because("multiple statements are not allowed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_select_is_safe() {
        assert!(check("SELECT make_name, COUNT(*) FROM dim_vehicle GROUP BY make_name").safe);
    }

    #[test]
    fn cte_select_is_safe() {
        assert!(
            check("WITH recent AS (SELECT * FROM fact_maintenance) SELECT COUNT(*) FROM recent")
                .safe
        );
    }

    #[test]
    fn every_forbidden_keyword_is_rejected() {
        for kw in [
            "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "MERGE", "EXEC",
        ] {
            let sql = format!("SELECT * FROM t WHERE x IN (SELECT y FROM u) -- {}", kw);
            // keyword embedded anywhere, even a comment, trips the screen
            let verdict = check(&sql);
            assert!(!verdict.safe, "should reject {}", kw);
        }
    }

    #[test]
    fn keyword_inside_subquery_is_rejected() {
        let verdict = check("SELECT * FROM (DELETE FROM dim_vehicle RETURNING *) t");
        assert!(!verdict.safe);
    }

    #[test]
    fn trailing_statement_is_rejected() {
        let verdict = check("SELECT * FROM dim_vehicle; DROP TABLE dim_vehicle;");
        assert!(!verdict.safe);
        assert!(verdict.notes.is_some());
    }

    #[test]
    fn case_and_word_boundaries() {
        assert!(!check("select * from t where a = 1 or DeLeTe from t").safe);
        // substrings of forbidden words are fine
        assert!(check("SELECT created_at, updated_flag FROM view_contract_health").safe);
    }

    #[test]
    fn non_select_single_statement_is_rejected() {
        assert!(!check("VACUUM").safe);
    }

    #[test]
    fn unparseable_text_is_rejected() {
        assert!(!check("this is not sql at all").safe);
    }
}
