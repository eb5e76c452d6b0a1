use crate::config::MergeSpec;
use crate::generator::cast_compiler::{compile, CompileContext};
use crate::generator::ir::{OrderKey, SqlExpr};
use crate::generator::notice::{NoticeKind, Notices};
use crate::parser::names::normalize_identifier;
use crate::schema::types::{ColumnSet, DestinationSchema};

/// Output column carrying the per-key rank.
pub const RANK_COLUMN: &str = "__merge_rank";

/// Per-key ranking: rows with rank 1 survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingClause {
    /// Compiled primary-key expressions.
    pub partition_by: Vec<SqlExpr>,
    /// Most recent first.
    pub order_by: Vec<OrderKey>,
}

impl RankingClause {
    /// `ROW_NUMBER() OVER (...)` for this ranking.
    pub fn row_number(&self) -> SqlExpr {
        SqlExpr::RowNumber {
            partition_by: self.partition_by.clone(),
            order_by: self.order_by.clone(),
        }
    }
}

/// Build the dedup ranking, or `None` when dedup is disabled.
///
/// Ordering, all descending with NULLs last:
/// 1. `COALESCE(recency, created)` when both are in the source, else whichever is;
/// 2. tie-breakers present in the source, in the order given;
/// 3. the primary-key columns.
///
/// Rows equal on every key rank in an engine-defined order.
pub fn ranking(
    spec: &MergeSpec,
    schema: &DestinationSchema,
    source: &ColumnSet,
    ctx: &CompileContext<'_>,
    notices: &mut Notices,
) -> Option<RankingClause> {
    if !spec.dedup.enabled {
        return None;
    }

    let value = |column: &str| compile(column, schema.get(column), ctx);
    let mut order_by = Vec::new();
    let mut used: Vec<String> = Vec::new();

    let recency = spec
        .recency_column()
        .map(normalize_identifier)
        .filter(|c| source.contains(c));
    let created = spec
        .dedup
        .created_column
        .as_deref()
        .map(normalize_identifier)
        .filter(|c| !c.is_empty() && source.contains(c) && Some(c) != recency.as_ref());

    match (&recency, &created) {
        (Some(r), Some(c)) => {
            // COALESCE operands share one type: the recency column's, else created's.
            let shared = schema.get(r).or_else(|| schema.get(c));
            order_by.push(OrderKey::desc(SqlExpr::func(
                "COALESCE",
                vec![compile(r, shared, ctx), compile(c, shared, ctx)],
            )));
        }
        (Some(only), None) | (None, Some(only)) => order_by.push(OrderKey::desc(value(only))),
        (None, None) => {}
    }
    used.extend(recency);
    used.extend(created);

    for tiebreaker in &spec.dedup.tiebreakers {
        let column = normalize_identifier(tiebreaker);
        if column.is_empty() || used.contains(&column) {
            continue;
        }
        if !source.contains(&column) {
            notices.warn(
                NoticeKind::SkippedTiebreaker,
                format!("dedup tie-breaker {column:?} not in source; skipped"),
            );
            continue;
        }
        order_by.push(OrderKey::desc(value(&column)));
        used.push(column);
    }

    let partition_by: Vec<SqlExpr> = spec.primary_key.iter().map(|pk| value(pk)).collect();
    for pk in &spec.primary_key {
        if !used.contains(pk) {
            order_by.push(OrderKey::desc(value(pk)));
            used.push(pk.clone());
        }
    }

    Some(RankingClause {
        partition_by,
        order_by,
    })
}
