use sqlparser::ast::Expr;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::error::{MergeError, Result};

/// Parse a caller-supplied SQL fragment as exactly one expression.
///
/// Fragments are spliced into the generated statement verbatim, so anything
/// that is not a single complete expression (trailing tokens, a second
/// statement after `;`, unbalanced parentheses) is rejected.
pub fn parse_fragment(fragment: &str) -> Result<Expr> {
    let invalid = |reason: String| MergeError::InvalidFragment {
        fragment: fragment.to_string(),
        reason,
    };

    if fragment.trim().is_empty() {
        return Err(invalid("fragment is empty".to_string()));
    }

    let dialect = GenericDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(fragment)
        .map_err(|e| invalid(e.to_string()))?;
    let expr = parser.parse_expr().map_err(|e| invalid(e.to_string()))?;

    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(invalid(format!("unexpected trailing input at {}", next.token)));
    }

    Ok(expr)
}

/// Validate a fragment and return it trimmed, ready for splicing.
pub fn validate_fragment(fragment: &str) -> Result<String> {
    parse_fragment(fragment)?;
    Ok(fragment.trim().to_string())
}

/// Extract a simple column name from an expression.
///
/// Supports plain identifiers (`updated_at`) and qualified identifiers
/// (`s.updated_at`), returning only the terminal column component.
pub fn extract_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => Some(parts.last()?.value.clone()),
        Expr::Nested(inner) => extract_column_name(inner),
        Expr::Cast { expr, .. } => extract_column_name(expr),
        _ => None,
    }
}
