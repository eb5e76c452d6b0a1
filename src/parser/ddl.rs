use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{MergeError, Result};
use crate::parser::names::split_qualified_name;

/// A table declared by a `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Unquoted name parts, e.g. `["silver", "orders"]`.
    pub name_parts: Vec<String>,
    /// `(column, declared type)` pairs in declaration order.
    pub columns: Vec<(String, String)>,
}

/// Parse every `CREATE TABLE` in `sql`; other statements are skipped.
pub fn parse_create_tables(sql: &str) -> Result<Vec<TableDefinition>> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| MergeError::Config(format!("failed to parse DDL: {e}")))?;

    let tables = statements
        .into_iter()
        .filter_map(|statement| match statement {
            Statement::CreateTable(create) => Some(TableDefinition {
                name_parts: split_qualified_name(&create.name.to_string()),
                columns: create
                    .columns
                    .iter()
                    .map(|column| (column.name.value.clone(), column.data_type.to_string()))
                    .collect(),
            }),
            _ => None,
        })
        .collect();

    Ok(tables)
}
