//! The single rendering pass from [`crate::generator::ir`] to SQL text.
//!
//! Identifier and literal escaping live here and nowhere else.

use std::fmt::Write as _;

use crate::generator::ir::{
    BinaryOp, Cte, MergeStatement, OrderKey, Relation, Select, SelectItem, SourceQuery, SqlExpr,
};

/// Double-quote an identifier, doubling embedded `"`.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded `'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote and dot-join the parts of a qualified name.
pub fn quote_qualified<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| quote_ident(p.as_ref()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Render a scalar expression on one line.
pub fn render_expr(expr: &SqlExpr) -> String {
    match expr {
        SqlExpr::Column { qualifier, name } => match qualifier {
            Some(q) => format!("{q}.{}", quote_ident(name)),
            None => quote_ident(name),
        },
        SqlExpr::Str(value) => quote_literal(value),
        SqlExpr::Int(value) => value.to_string(),
        SqlExpr::Bool(true) => "TRUE".to_string(),
        SqlExpr::Bool(false) => "FALSE".to_string(),
        SqlExpr::Null => "NULL".to_string(),
        SqlExpr::Typed { type_name, value } => format!("{type_name} {}", quote_literal(value)),
        SqlExpr::Keyword(keyword) => keyword.clone(),
        SqlExpr::Cast { expr, target } => format!("CAST({} AS {target})", render_expr(expr)),
        SqlExpr::TryCast { expr, target } => {
            format!("TRY_CAST({} AS {target})", render_expr(expr))
        }
        SqlExpr::Func { name, args } => format!("{name}({})", render_list(args)),
        SqlExpr::Binary { left, op, right } => format!(
            "{} {} {}",
            render_operand(left, *op),
            op.symbol(),
            render_operand(right, *op)
        ),
        SqlExpr::Case {
            branches,
            otherwise,
        } => {
            let mut out = String::from("CASE");
            for (condition, result) in branches {
                let _ = write!(
                    out,
                    " WHEN {} THEN {}",
                    render_expr(condition),
                    render_expr(result)
                );
            }
            if let Some(otherwise) = otherwise {
                let _ = write!(out, " ELSE {}", render_expr(otherwise));
            }
            out.push_str(" END");
            out
        }
        SqlExpr::InList { expr, list } => {
            format!("{} IN ({})", render_wrapped(expr), render_list(list))
        }
        SqlExpr::IsNull(expr) => format!("{} IS NULL", render_wrapped(expr)),
        SqlExpr::AtTimeZone { expr, zone } => {
            format!("{} AT TIME ZONE {}", render_wrapped(expr), quote_literal(zone))
        }
        SqlExpr::RowNumber {
            partition_by,
            order_by,
        } => {
            let mut window = Vec::new();
            if !partition_by.is_empty() {
                window.push(format!("PARTITION BY {}", render_list(partition_by)));
            }
            if !order_by.is_empty() {
                let keys: Vec<String> = order_by.iter().map(render_order_key).collect();
                window.push(format!("ORDER BY {}", keys.join(", ")));
            }
            format!("ROW_NUMBER() OVER ({})", window.join(" "))
        }
        SqlExpr::Fragment(sql) => format!("({sql})"),
    }
}

fn render_list(exprs: &[SqlExpr]) -> String {
    exprs.iter().map(render_expr).collect::<Vec<_>>().join(", ")
}

fn render_order_key(key: &OrderKey) -> String {
    let mut out = render_expr(&key.expr);
    if key.descending {
        out.push_str(" DESC");
    }
    if key.nulls_last {
        out.push_str(" NULLS LAST");
    }
    out
}

/// Parenthesize a binary operand that binds looser than its parent, or any
/// comparison nested inside another comparison.
fn render_operand(operand: &SqlExpr, parent: BinaryOp) -> String {
    if let SqlExpr::Binary { op, .. } = operand {
        let comparison = parent.precedence() == BinaryOp::Eq.precedence();
        if op.precedence() < parent.precedence() || (comparison && op.precedence() == parent.precedence()) {
            return format!("({})", render_expr(operand));
        }
    }
    render_expr(operand)
}

fn render_wrapped(expr: &SqlExpr) -> String {
    match expr {
        SqlExpr::Binary { .. } => format!("({})", render_expr(expr)),
        _ => render_expr(expr),
    }
}

fn indent(text: &str, by: usize) -> String {
    let pad = " ".repeat(by);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_select(select: &Select) -> String {
    let items: Vec<String> = select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::Wildcard(None) => "*".to_string(),
            SelectItem::Wildcard(Some(q)) => format!("{q}.*"),
            SelectItem::Expr { expr, alias: None } => render_expr(expr),
            SelectItem::Expr {
                expr,
                alias: Some(alias),
            } => format!("{} AS {}", render_expr(expr), quote_ident(alias)),
        })
        .collect();

    let relation = match &select.from {
        Relation::Table(locator) => locator.to_string(),
        Relation::Cte(name) => name.clone(),
    };

    let mut out = format!("SELECT {}\nFROM {relation}", items.join(", "));
    if let Some(alias) = &select.alias {
        let _ = write!(out, " AS {alias}");
    }
    if let Some(filter) = &select.filter {
        let _ = write!(out, "\nWHERE {}", render_expr(filter));
    }
    out
}

fn render_cte(cte: &Cte) -> String {
    format!("{} AS (\n{}\n)", cte.name, indent(&render_select(&cte.query), 2))
}

/// Render the `USING` subquery body.
pub fn render_source(source: &SourceQuery) -> String {
    let body = render_select(&source.body);
    if source.ctes.is_empty() {
        return body;
    }
    let ctes: Vec<String> = source.ctes.iter().map(render_cte).collect();
    format!("WITH {}\n{body}", ctes.join(", "))
}

/// Render a complete `MERGE INTO` statement.
pub fn render_merge(statement: &MergeStatement) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "MERGE INTO {} AS {}",
        statement.target, statement.target_alias
    );
    let _ = writeln!(
        out,
        "USING (\n{}\n) AS {}",
        indent(&render_source(&statement.source), 2),
        statement.source_alias
    );
    let _ = writeln!(out, "ON ({})", render_expr(&statement.on));

    match &statement.matched_guard {
        Some(guard) => {
            let _ = writeln!(out, "WHEN MATCHED AND {} THEN UPDATE SET", render_expr(guard));
        }
        None => out.push_str("WHEN MATCHED THEN UPDATE SET\n"),
    }
    let set: Vec<String> = statement
        .set
        .iter()
        .map(|item| format!("  {} = {}", quote_ident(&item.column), render_expr(&item.value)))
        .collect();
    let _ = writeln!(out, "{}", set.join(",\n"));

    let columns: Vec<String> = statement
        .insert_columns
        .iter()
        .map(|c| quote_ident(c))
        .collect();
    let values: Vec<String> = statement
        .insert_values
        .iter()
        .map(|v| format!("  {}", render_expr(v)))
        .collect();
    let _ = writeln!(out, "WHEN NOT MATCHED THEN INSERT ({})", columns.join(", "));
    let _ = write!(out, "VALUES (\n{}\n)", values.join(",\n"));
    out
}
