//! Type-aware source value normalization.
//!
//! Every rule reads the raw source value as text and degrades to `NULL` on
//! anything it cannot parse; no compiled expression raises at runtime.

use crate::config::ProvenanceConfig;
use crate::generator::ir::{BinaryOp, SqlExpr};
use crate::parser::names::normalize_identifier;
use crate::schema::types::{ColumnType, TypeClass};

/// Unicode space separators, including the no-break space.
const SPACE_SEPARATORS: &str = r"\p{Zs}";
const NON_NUMERIC: &str = r"[^0-9\-,\.]";
const NON_DIGIT_OR_SIGN: &str = r"[^0-9\-]";
const NON_DECIMAL: &str = r"[^0-9\-\.]";
const LEADING_INTEGER: &str = r"^-?[0-9]+";
/// A comma with no dot after it: the comma is the decimal separator.
const COMMA_IS_DECIMAL: &str = r",[^.]*$";
const TS_FORMAT: &str = "yyyy-MM-dd HH:mm:ss.SSS";

const TRUE_WORDS: [&str; 5] = ["t", "true", "1", "y", "yes"];
const FALSE_WORDS: [&str; 5] = ["f", "false", "0", "n", "no"];

/// Inputs shared by every compiled expression in one run.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    /// Alias of the source relation (`s`).
    pub source_alias: &'a str,
    /// Alias of the destination relation (`t`).
    pub target_alias: &'a str,
    /// Operation tag literal.
    pub op_literal: &'a str,
    /// Provenance column names and zone.
    pub provenance: &'a ProvenanceConfig,
}

/// Where a compiled expression is used in the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Destination side of the match predicate; the raw target column.
    MatchLeft,
    /// Source side of the match predicate.
    MatchRight,
    /// Right-hand side of an `UPDATE SET` assignment.
    SetRhs,
    /// Value in the `INSERT ... VALUES` list.
    InsertRhs,
}

/// A compiled `(column, role)` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnExpression {
    /// Destination column name.
    pub column: String,
    /// Statement position.
    pub role: ColumnRole,
    /// Expression tree.
    pub expr: SqlExpr,
}

/// Compile `column` for `role`.
pub fn column_expression(
    column: &str,
    role: ColumnRole,
    column_type: Option<&ColumnType>,
    ctx: &CompileContext<'_>,
) -> ColumnExpression {
    let expr = match role {
        ColumnRole::MatchLeft => SqlExpr::column(ctx.target_alias, &normalize_identifier(column)),
        ColumnRole::MatchRight | ColumnRole::SetRhs | ColumnRole::InsertRhs => {
            compile(column, column_type, ctx)
        }
    };
    ColumnExpression {
        column: normalize_identifier(column),
        role,
        expr,
    }
}

/// Compile the normalized source value of `column` for its destination type.
///
/// Provenance columns ignore the source entirely. A column without a known
/// destination type passes through unchanged.
pub fn compile(column: &str, column_type: Option<&ColumnType>, ctx: &CompileContext<'_>) -> SqlExpr {
    let name = normalize_identifier(column);

    if name == normalize_identifier(&ctx.provenance.op_column) {
        let target = column_type.map_or("varchar", ColumnType::cast_target);
        return SqlExpr::string(ctx.op_literal).cast(target);
    }
    if name == normalize_identifier(&ctx.provenance.timestamp_column) {
        let target = column_type.map_or("timestamp", ColumnType::cast_target);
        return ingestion_timestamp(&ctx.provenance.time_zone).cast(target);
    }

    let source = SqlExpr::column(ctx.source_alias, &name);
    let Some(column_type) = column_type else {
        return source;
    };
    let target = column_type.cast_target();

    match column_type.class {
        TypeClass::Integer => integer_chain(source, target),
        TypeClass::Decimal => decimal_chain(source, target),
        TypeClass::Boolean => boolean_words(source),
        TypeClass::Date | TypeClass::Timestamp => temporal(source, target),
        TypeClass::String | TypeClass::Other => source.try_cast(target),
    }
}

/// `format_datetime(current_timestamp AT TIME ZONE zone, 'yyyy-MM-dd HH:mm:ss.SSS')`.
fn ingestion_timestamp(zone: &str) -> SqlExpr {
    SqlExpr::func(
        "format_datetime",
        vec![
            SqlExpr::AtTimeZone {
                expr: Box::new(SqlExpr::Keyword("current_timestamp".to_string())),
                zone: zone.to_string(),
            },
            SqlExpr::string(TS_FORMAT),
        ],
    )
}

fn as_text(source: SqlExpr) -> SqlExpr {
    source.cast("varchar")
}

fn regexp_replace(input: SqlExpr, pattern: &str) -> SqlExpr {
    SqlExpr::func(
        "REGEXP_REPLACE",
        vec![input, SqlExpr::string(pattern), SqlExpr::string("")],
    )
}

fn replace(input: SqlExpr, from: &str, to: &str) -> SqlExpr {
    SqlExpr::func(
        "REPLACE",
        vec![input, SqlExpr::string(from), SqlExpr::string(to)],
    )
}

fn split_part(input: SqlExpr, delimiter: &str) -> SqlExpr {
    SqlExpr::func(
        "SPLIT_PART",
        vec![input, SqlExpr::string(delimiter), SqlExpr::Int(1)],
    )
}

fn null_if_empty(input: SqlExpr) -> SqlExpr {
    SqlExpr::func("NULLIF", vec![input, SqlExpr::string("")])
}

fn trim(input: SqlExpr) -> SqlExpr {
    SqlExpr::func("TRIM", vec![input])
}

/// Text with every space separator removed.
fn compact_text(source: SqlExpr) -> SqlExpr {
    trim(regexp_replace(as_text(source), SPACE_SEPARATORS))
}

fn integer_chain(source: SqlExpr, target: &str) -> SqlExpr {
    let base = compact_text(source);

    let leading_run = SqlExpr::func(
        "REGEXP_EXTRACT",
        vec![
            regexp_replace(base.clone(), NON_NUMERIC),
            SqlExpr::string(LEADING_INTEGER),
        ],
    );
    let dot_thousands = regexp_replace(
        split_part(replace(base.clone(), ".", ""), ","),
        NON_DIGIT_OR_SIGN,
    );
    let comma_thousands = regexp_replace(
        split_part(replace(base, ",", ""), "."),
        NON_DIGIT_OR_SIGN,
    );

    SqlExpr::func(
        "COALESCE",
        [leading_run, dot_thousands, comma_thousands]
            .into_iter()
            .map(|stage| null_if_empty(stage).try_cast(target))
            .collect(),
    )
}

fn decimal_chain(source: SqlExpr, target: &str) -> SqlExpr {
    let base = compact_text(source);
    let cleaned = regexp_replace(base.clone(), NON_NUMERIC);

    let through_double = |text: SqlExpr| null_if_empty(text).try_cast("DOUBLE").try_cast(target);
    let comma_decimal = through_double(replace(replace(cleaned.clone(), ".", ""), ",", "."));
    let dot_decimal = through_double(replace(cleaned.clone(), ",", ""));
    let comma_is_decimal = SqlExpr::func(
        "REGEXP_LIKE",
        vec![cleaned, SqlExpr::string(COMMA_IS_DECIMAL)],
    );

    let pick = |first: &SqlExpr, second: &SqlExpr| SqlExpr::Case {
        branches: vec![(comma_is_decimal.clone(), first.clone())],
        otherwise: Some(Box::new(second.clone())),
    };
    let stripped = null_if_empty(regexp_replace(base, NON_DECIMAL)).try_cast(target);

    SqlExpr::func(
        "COALESCE",
        vec![
            pick(&comma_decimal, &dot_decimal),
            pick(&dot_decimal, &comma_decimal),
            stripped,
        ],
    )
}

fn boolean_words(source: SqlExpr) -> SqlExpr {
    let word = SqlExpr::func("LOWER", vec![trim(as_text(source))]);
    let in_list = |words: &[&str]| SqlExpr::InList {
        expr: Box::new(word.clone()),
        list: words.iter().map(|w| SqlExpr::string(w)).collect(),
    };
    SqlExpr::Case {
        branches: vec![
            (in_list(&TRUE_WORDS), SqlExpr::Bool(true)),
            (in_list(&FALSE_WORDS), SqlExpr::Bool(false)),
        ],
        otherwise: Some(Box::new(SqlExpr::Null)),
    }
}

fn temporal(source: SqlExpr, target: &str) -> SqlExpr {
    let text = trim(as_text(source));
    SqlExpr::Case {
        branches: vec![(
            SqlExpr::IsNull(Box::new(null_if_empty(text.clone()))),
            SqlExpr::Null,
        )],
        otherwise: Some(Box::new(text.try_cast(target))),
    }
}

/// Epoch sentinel used to coalesce NULL recency values.
pub fn recency_sentinel(column_type: Option<&ColumnType>) -> SqlExpr {
    match column_type.map(|t| t.class) {
        Some(TypeClass::Date) => SqlExpr::typed("DATE", "1970-01-01"),
        Some(TypeClass::Integer | TypeClass::Decimal) => SqlExpr::Int(0),
        _ => SqlExpr::typed("TIMESTAMP", "1970-01-01 00:00:00"),
    }
}

/// `COALESCE(source, sentinel) > COALESCE(TRY_CAST(target AS type), sentinel)`.
///
/// Temporal and numeric columns compare in their declared type. Any other
/// class is read as text on both sides and compared as a timestamp.
pub fn recency_guard(column: &str, column_type: &ColumnType, ctx: &CompileContext<'_>) -> SqlExpr {
    let target = SqlExpr::column(ctx.target_alias, &normalize_identifier(column));
    let ordered = column_type.class.is_temporal()
        || matches!(column_type.class, TypeClass::Integer | TypeClass::Decimal);

    let (compare_as, target) = if ordered {
        (column_type.clone(), target.try_cast(column_type.cast_target()))
    } else {
        (
            ColumnType::new("timestamp"),
            trim(as_text(target)).try_cast("timestamp"),
        )
    };
    let sentinel = recency_sentinel(Some(&compare_as));
    let source = compile(column, Some(&compare_as), ctx);

    SqlExpr::func("COALESCE", vec![source, sentinel.clone()])
        .binary(BinaryOp::Gt, SqlExpr::func("COALESCE", vec![target, sentinel]))
}
