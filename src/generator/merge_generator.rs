//! Merge composition.
//!
//! [`compile_merge`] is the full pipeline from a
//! [`MergeSpec`](crate::config::MergeSpec), a destination schema and the
//! source column list to one rendered `MERGE` statement.
//! [`compose`] is the last step on its own, for callers that reconcile and
//! rank themselves.

use std::fmt;

use tracing::info;

use crate::config::{MergeSpec, WindowFilter};
use crate::error::{MergeError, Result};
use crate::generator::cast_compiler::{
    column_expression, recency_guard, ColumnRole, CompileContext,
};
use crate::generator::dedup::{ranking, RankingClause, RANK_COLUMN};
use crate::generator::ir::{
    BinaryOp, Cte, MergeStatement, Relation, Select, SelectItem, SetItem, SourceQuery, SqlExpr,
};
use crate::generator::notice::{Notice, NoticeKind, NoticeLevel, Notices};
use crate::generator::render::render_merge;
use crate::parser::names::normalize_identifier;
use crate::reconcile::columns::{reconcile, Reconciliation};
use crate::reconcile::positional::{align_positional, Alignment};
use crate::schema::types::{ColumnSet, DestinationSchema};

const ALIGNED_CTE: &str = "aligned";
const RANKED_CTE: &str = "src";
const EPOCH: &str = "1970-01-01 00:00:00";

/// The final statement plus everything learned while building it.
///
/// Immutable once built; submitted at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    sql: String,
    plan: MergeStatement,
    merged_columns: Vec<String>,
    ignored_columns: Vec<String>,
    notices: Vec<Notice>,
}

impl CompiledStatement {
    /// Rendered SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Structured statement the SQL was rendered from.
    pub fn plan(&self) -> &MergeStatement {
        &self.plan
    }

    /// Destination columns the statement writes.
    pub fn merged_columns(&self) -> &[String] {
        &self.merged_columns
    }

    /// Source columns left out because the destination lacks them.
    pub fn ignored_columns(&self) -> &[String] {
        &self.ignored_columns
    }

    /// Non-fatal diagnostics in the order they were raised.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Number of warning-level notices.
    pub fn warning_count(&self) -> usize {
        self.notices
            .iter()
            .filter(|n| n.level == NoticeLevel::Warning)
            .count()
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Source side of the statement after optional positional alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumns {
    /// Column names visible through the source alias.
    pub columns: ColumnSet,
    /// Rename pairs when the source was aligned positionally.
    pub alignment: Option<Alignment>,
}

impl SourceColumns {
    /// Source columns used as-is.
    pub fn named(columns: ColumnSet) -> Self {
        Self {
            columns,
            alignment: None,
        }
    }
}

fn check_primary_key(spec: &MergeSpec, schema: &DestinationSchema) -> Result<()> {
    if spec.primary_key.is_empty() {
        return Err(MergeError::EmptyPrimaryKey);
    }
    for pk in &spec.primary_key {
        if !schema.contains(pk) {
            return Err(MergeError::PrimaryKeyNotInDestination {
                column: pk.clone(),
                locator: spec.destination.to_string(),
            });
        }
    }
    Ok(())
}

fn context(spec: &MergeSpec) -> CompileContext<'_> {
    CompileContext {
        source_alias: &spec.source_alias,
        target_alias: &spec.target_alias,
        op_literal: &spec.op_literal,
        provenance: &spec.provenance,
    }
}

/// Validate, align, reconcile, rank, and compose in one call.
pub fn compile_merge(
    spec: &MergeSpec,
    schema: &DestinationSchema,
    source_columns: &ColumnSet,
) -> Result<CompiledStatement> {
    spec.validate()?;
    check_primary_key(spec, schema)?;

    let mut notices = Notices::new();

    let source = if spec.align_positional {
        let targets: Vec<&str> = schema
            .column_names()
            .filter(|c| !spec.provenance.is_provenance(c))
            .collect();
        let alignment = align_positional(&targets, source_columns.as_slice());
        notices.extend(alignment.notices.clone());
        info!(branch = %alignment.branch, mapped = alignment.pairs.len(), "aligned source columns");
        SourceColumns {
            columns: ColumnSet::new(alignment.targets()),
            alignment: Some(alignment),
        }
    } else {
        SourceColumns::named(source_columns.clone())
    };

    let reconciliation = reconcile(&source.columns, schema, &spec.provenance);
    let ctx = context(spec);
    let ranking = ranking(spec, schema, &source.columns, &ctx, &mut notices);

    compose(spec, schema, &source, &reconciliation, ranking.as_ref(), notices)
}

/// Assemble the statement from reconciled columns and an optional ranking.
///
/// Fails before building anything when a primary-key column is missing from
/// the destination.
pub fn compose(
    spec: &MergeSpec,
    schema: &DestinationSchema,
    source: &SourceColumns,
    reconciliation: &Reconciliation,
    ranking: Option<&RankingClause>,
    mut notices: Notices,
) -> Result<CompiledStatement> {
    check_primary_key(spec, schema)?;
    spec.validate()?;

    let ctx = context(spec);
    notices.extend(reconciliation.notices.clone());

    let on = match_predicate(spec, schema, &ctx);
    let filter = source_filter(spec, &source.columns, &mut notices)?;
    let source_query = source_query(spec, source, filter, ranking);
    let matched_guard = update_guard(spec, schema, &source.columns, &ctx, &mut notices);
    let set = update_assignments(spec, schema, reconciliation, &ctx, &mut notices);
    let (insert_columns, insert_values) =
        insert_projection(spec, schema, reconciliation, &ctx, &mut notices);

    let plan = MergeStatement {
        target: spec.destination.clone(),
        target_alias: spec.target_alias.clone(),
        source: source_query,
        source_alias: spec.source_alias.clone(),
        on,
        matched_guard,
        set,
        insert_columns,
        insert_values,
    };
    let sql = render_merge(&plan);

    info!(
        destination = %spec.destination,
        columns = reconciliation.columns.len(),
        warnings = notices.warning_count(),
        "compiled merge statement"
    );

    Ok(CompiledStatement {
        sql,
        plan,
        merged_columns: reconciliation.columns.clone(),
        ignored_columns: reconciliation.ignored.clone(),
        notices: notices.into_vec(),
    })
}

fn match_predicate(spec: &MergeSpec, schema: &DestinationSchema, ctx: &CompileContext<'_>) -> SqlExpr {
    let keys = spec.primary_key.iter().map(|pk| {
        let ty = schema.get(pk);
        let left = column_expression(pk, ColumnRole::MatchLeft, ty, ctx);
        let right = column_expression(pk, ColumnRole::MatchRight, ty, ctx);
        left.expr.equals(right.expr)
    });
    let extra = spec
        .extra_on
        .iter()
        .map(|p| SqlExpr::Fragment(p.trim().to_string()));

    // check_primary_key guarantees at least one key.
    SqlExpr::and_all(keys.chain(extra)).unwrap_or(SqlExpr::Bool(true))
}

fn timestamp_literal(bound: chrono::NaiveDateTime) -> SqlExpr {
    SqlExpr::typed(
        "TIMESTAMP",
        &bound.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
    )
}

fn window_predicate(column: &str, window: &WindowFilter, alias: &str) -> Result<SqlExpr> {
    let bounds = window.bounds()?;
    let value = SqlExpr::column(alias, column).try_cast("timestamp");
    let mut parts = Vec::new();
    if let Some(start) = bounds.start {
        parts.push(value.clone().binary(BinaryOp::GtEq, timestamp_literal(start)));
    }
    if let Some(end) = bounds.end {
        parts.push(value.binary(BinaryOp::Lt, timestamp_literal(end)));
    }
    SqlExpr::and_all(parts).ok_or_else(|| {
        MergeError::Config("window filter needs a start or an end bound".to_string())
    })
}

fn lookback_predicate(column: &str, days: u32, alias: &str) -> SqlExpr {
    let value = SqlExpr::func(
        "COALESCE",
        vec![
            SqlExpr::column(alias, column).try_cast("timestamp"),
            SqlExpr::typed("TIMESTAMP", EPOCH),
        ],
    );
    let cutoff = SqlExpr::func(
        "date_add",
        vec![
            SqlExpr::string("day"),
            SqlExpr::Int(-i64::from(days)),
            SqlExpr::Keyword("current_date".to_string()),
        ],
    )
    .cast("timestamp");
    value.binary(BinaryOp::Gt, cutoff)
}

/// Explicit window, else default lookback, else no filter.
fn source_filter(
    spec: &MergeSpec,
    source: &ColumnSet,
    notices: &mut Notices,
) -> Result<Option<SqlExpr>> {
    let recency = spec.recency_column().map(normalize_identifier);

    if let Some(window) = &spec.window {
        let column = window
            .column
            .as_deref()
            .map(normalize_identifier)
            .filter(|c| !c.is_empty())
            .or(recency);
        return match column {
            Some(column) if source.contains(&column) => {
                window_predicate(&column, window, &spec.source_alias).map(Some)
            }
            Some(column) => {
                notices.warn(
                    NoticeKind::FilterDropped,
                    format!("window column {column:?} not in source; filter dropped, scanning all rows"),
                );
                Ok(None)
            }
            None => {
                notices.warn(
                    NoticeKind::FilterDropped,
                    "window filter has no column and no recency column is set; filter dropped",
                );
                Ok(None)
            }
        };
    }

    Ok(recency
        .filter(|column| spec.lookback_days > 0 && source.contains(column))
        .map(|column| lookback_predicate(&column, spec.lookback_days, &spec.source_alias)))
}

fn source_query(
    spec: &MergeSpec,
    source: &SourceColumns,
    filter: Option<SqlExpr>,
    ranking: Option<&RankingClause>,
) -> SourceQuery {
    let alias = spec.source_alias.clone();
    let mut ctes = Vec::new();

    let base = match &source.alignment {
        Some(alignment) => {
            ctes.push(Cte {
                name: ALIGNED_CTE.to_string(),
                query: Select {
                    projection: alignment
                        .pairs
                        .iter()
                        .map(|(incoming, target)| SelectItem::Expr {
                            expr: SqlExpr::column(&alias, incoming),
                            alias: Some(target.clone()),
                        })
                        .collect(),
                    from: Relation::Table(spec.source.clone()),
                    alias: Some(alias.clone()),
                    filter: None,
                },
            });
            Relation::Cte(ALIGNED_CTE.to_string())
        }
        None => Relation::Table(spec.source.clone()),
    };

    let Some(ranking) = ranking else {
        return SourceQuery {
            ctes,
            body: Select {
                projection: vec![SelectItem::Wildcard(None)],
                from: base,
                alias: Some(alias),
                filter,
            },
        };
    };

    ctes.push(Cte {
        name: RANKED_CTE.to_string(),
        query: Select {
            projection: vec![
                SelectItem::Wildcard(Some(alias.clone())),
                SelectItem::Expr {
                    expr: ranking.row_number(),
                    alias: Some(RANK_COLUMN.to_string()),
                },
            ],
            from: base,
            alias: Some(alias),
            filter,
        },
    });

    SourceQuery {
        ctes,
        body: Select {
            projection: source
                .columns
                .iter()
                .map(|c| SelectItem::Expr {
                    expr: SqlExpr::column(RANKED_CTE, c),
                    alias: None,
                })
                .collect(),
            from: Relation::Cte(RANKED_CTE.to_string()),
            alias: None,
            filter: Some(SqlExpr::column(RANKED_CTE, RANK_COLUMN).equals(SqlExpr::Int(1))),
        },
    }
}

fn update_guard(
    spec: &MergeSpec,
    schema: &DestinationSchema,
    source: &ColumnSet,
    ctx: &CompileContext<'_>,
    notices: &mut Notices,
) -> Option<SqlExpr> {
    let recency = normalize_identifier(spec.recency_column()?);
    let column_type = schema.get(&recency)?;
    if !source.contains(&recency) {
        notices.warn(
            NoticeKind::RecencyNotInSource,
            format!("recency column {recency:?} not in source; updates are not guarded"),
        );
        return None;
    }
    Some(recency_guard(&recency, column_type, ctx))
}

fn update_assignments(
    spec: &MergeSpec,
    schema: &DestinationSchema,
    reconciliation: &Reconciliation,
    ctx: &CompileContext<'_>,
    notices: &mut Notices,
) -> Vec<SetItem> {
    let excluded: Vec<String> = spec
        .exclude_update
        .iter()
        .map(|c| normalize_identifier(c))
        .collect();

    let mut set: Vec<SetItem> = reconciliation
        .columns
        .iter()
        .filter(|c| !spec.primary_key.contains(c) && !excluded.contains(c))
        .map(|c| SetItem {
            column: c.clone(),
            value: column_expression(c, ColumnRole::SetRhs, schema.get(c), ctx).expr,
        })
        .collect();

    for assignment in &spec.extra_set {
        let column = normalize_identifier(&assignment.column);
        if !schema.contains(&column) {
            notices.warn(
                NoticeKind::SkippedAssignment,
                format!("extra SET for non-destination column {column:?} skipped"),
            );
            continue;
        }
        let value = SqlExpr::Fragment(assignment.expression.trim().to_string());
        match set.iter_mut().find(|item| item.column == column) {
            Some(item) => item.value = value,
            None => set.push(SetItem { column, value }),
        }
    }

    if set.is_empty() {
        let pk = &spec.primary_key[0];
        set.push(SetItem {
            column: pk.clone(),
            value: SqlExpr::column(&spec.target_alias, pk),
        });
    }
    set
}

fn insert_projection(
    spec: &MergeSpec,
    schema: &DestinationSchema,
    reconciliation: &Reconciliation,
    ctx: &CompileContext<'_>,
    notices: &mut Notices,
) -> (Vec<String>, Vec<SqlExpr>) {
    let mut columns = reconciliation.columns.clone();
    let mut values: Vec<SqlExpr> = columns
        .iter()
        .map(|c| column_expression(c, ColumnRole::InsertRhs, schema.get(c), ctx).expr)
        .collect();

    for assignment in &spec.extra_insert {
        let column = normalize_identifier(&assignment.column);
        if !schema.contains(&column) {
            notices.warn(
                NoticeKind::SkippedAssignment,
                format!("extra INSERT for non-destination column {column:?} skipped"),
            );
            continue;
        }
        let value = SqlExpr::Fragment(assignment.expression.trim().to_string());
        match columns.iter().position(|c| *c == column) {
            Some(idx) => values[idx] = value,
            None => {
                columns.push(column);
                values.push(value);
            }
        }
    }

    (columns, values)
}
