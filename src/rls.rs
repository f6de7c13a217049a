//! Row-level security rewriter
//!
//! Injects a customer-ID predicate into generated SQL based on the caller's
//! access scope. The rewrite is structural: the statement is parsed and the
//! predicate is ANDed into the selection of every SELECT scope (set-operation
//! arms, derived tables, CTEs included), then the tree is re-rendered. Text
//! splicing cannot survive arbitrary model-generated query shapes.

use crate::access::AccessScope;
use crate::error::{AssistantError, Result};
use sqlparser::ast::{Expr, Join, Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Rewrite `sql` to honor the caller's scope.
///
/// Unrestricted callers get the input back byte-for-byte. A caller with no
/// customer assignments gets an unsatisfiable predicate, so the query provably
/// returns zero rows instead of silently running unrestricted.
pub fn apply_rls(sql: &str, scope: &AccessScope, rls_column: &str) -> Result<String> {
    let predicate_sql = match scope {
        AccessScope::Unrestricted => return Ok(sql.to_string()),
        AccessScope::RestrictedTo(ids) => {
            if ids.is_empty() {
                // Scope construction should make this unreachable; refuse to
                // widen access if it ever is.
                "1 = 0".to_string()
            } else {
                let quoted: Vec<String> = ids
                    .iter()
                    .map(|id| format!("'{}'", id.replace('\'', "''")))
                    .collect();
                format!("{} IN ({})", rls_column, quoted.join(", "))
            }
        }
        AccessScope::NoAccess => "1 = 0".to_string(),
    };

    let predicate = parse_predicate(&predicate_sql)?;

    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| AssistantError::Rewrite(format!("cannot parse SQL for RLS: {}", e)))?;
    let statement = match statements.as_mut_slice() {
        [stmt] => stmt,
        _ => {
            return Err(AssistantError::Rewrite(
                "RLS rewrite expects exactly one statement".to_string(),
            ))
        }
    };
    let query = match statement {
        Statement::Query(q) => q,
        _ => {
            return Err(AssistantError::Rewrite(
                "RLS rewrite expects a SELECT statement".to_string(),
            ))
        }
    };

    rewrite_query(query, &predicate);
    Ok(statement.to_string())
}

fn parse_predicate(predicate_sql: &str) -> Result<Expr> {
    Parser::new(&GenericDialect {})
        .try_with_sql(predicate_sql)
        .and_then(|mut p| p.parse_expr())
        .map_err(|e| AssistantError::Rewrite(format!("cannot parse RLS predicate: {}", e)))
}

fn rewrite_query(query: &mut Query, predicate: &Expr) {
    if let Some(with) = query.with.as_mut() {
        for cte in with.cte_tables.iter_mut() {
            rewrite_query(&mut cte.query, predicate);
        }
    }
    rewrite_set_expr(&mut query.body, predicate);
}

fn rewrite_set_expr(body: &mut SetExpr, predicate: &Expr) {
    match body {
        SetExpr::Select(select) => {
            for table in select.from.iter_mut() {
                rewrite_table_with_joins(table, predicate);
            }
            let combined = match select.selection.take() {
                Some(existing) => Expr::BinaryOp {
                    left: Box::new(Expr::Nested(Box::new(existing))),
                    op: sqlparser::ast::BinaryOperator::And,
                    right: Box::new(predicate.clone()),
                },
                None => predicate.clone(),
            };
            select.selection = Some(combined);
        }
        SetExpr::Query(inner) => rewrite_query(inner, predicate),
        SetExpr::SetOperation { left, right, .. } => {
            rewrite_set_expr(left, predicate);
            rewrite_set_expr(right, predicate);
        }
        _ => {}
    }
}

fn rewrite_table_with_joins(table: &mut TableWithJoins, predicate: &Expr) {
    rewrite_table_factor(&mut table.relation, predicate);
    for Join { relation, .. } in table.joins.iter_mut() {
        rewrite_table_factor(relation, predicate);
    }
}

fn rewrite_table_factor(factor: &mut TableFactor, predicate: &Expr) {
    match factor {
        TableFactor::Derived { subquery, .. } => rewrite_query(subquery, predicate),
        // Parenthesized joins open another scope that can itself contain
        // derived tables.
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => rewrite_table_with_joins(table_with_joins, predicate),
        _ => {}
    }
}
