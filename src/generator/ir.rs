//! Statement intermediate representation.
//!
//! The composer builds a [`MergeStatement`] out of [`SqlExpr`] trees and hands
//! it to [`crate::generator::render`], which is the only place that turns
//! identifiers and literals into SQL text. Nothing in this module knows about
//! quoting.
//!
//! Variants are data-only: all SQL rendering logic lives in the renderer.

use crate::schema::locator::RelationLocator;

/// Binary operators used by generated predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Gt | Self::GtEq | Self::Lt => 3,
        }
    }

    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// A typed scalar expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlExpr {
    /// Column reference, optionally qualified by a relation alias: `s."col"`.
    Column {
        /// Relation alias such as `s` or `t`.
        qualifier: Option<String>,
        /// Unquoted column name.
        name: String,
    },
    /// Single-quoted string literal.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// `NULL`.
    Null,
    /// Typed literal such as `TIMESTAMP '1970-01-01 00:00:00'`.
    Typed {
        /// Type keyword, e.g. `TIMESTAMP` or `DATE`.
        type_name: String,
        /// Literal body.
        value: String,
    },
    /// Niladic keyword such as `current_timestamp` or `current_date`.
    Keyword(String),
    /// `CAST(expr AS target)`.
    Cast {
        /// Value being cast.
        expr: Box<SqlExpr>,
        /// Engine type text.
        target: String,
    },
    /// `TRY_CAST(expr AS target)`; NULL instead of an error on failure.
    TryCast {
        /// Value being cast.
        expr: Box<SqlExpr>,
        /// Engine type text.
        target: String,
    },
    /// Function call `name(args...)`.
    Func {
        /// Function name, rendered verbatim.
        name: String,
        /// Positional arguments.
        args: Vec<SqlExpr>,
    },
    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<SqlExpr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<SqlExpr>,
    },
    /// Searched `CASE WHEN ... THEN ... [ELSE ...] END`.
    Case {
        /// `(condition, result)` pairs in order.
        branches: Vec<(SqlExpr, SqlExpr)>,
        /// `ELSE` result.
        otherwise: Option<Box<SqlExpr>>,
    },
    /// `expr IN (list...)`.
    InList {
        /// Tested value.
        expr: Box<SqlExpr>,
        /// Candidate values.
        list: Vec<SqlExpr>,
    },
    /// `expr IS NULL`.
    IsNull(Box<SqlExpr>),
    /// `expr AT TIME ZONE 'zone'`.
    AtTimeZone {
        /// Timestamp value.
        expr: Box<SqlExpr>,
        /// IANA zone name.
        zone: String,
    },
    /// `ROW_NUMBER() OVER (PARTITION BY ... ORDER BY ...)`.
    RowNumber {
        /// Partition expressions.
        partition_by: Vec<SqlExpr>,
        /// Ordering keys.
        order_by: Vec<OrderKey>,
    },
    /// Caller-supplied fragment that already passed parse validation.
    ///
    /// Rendered in parentheses so it cannot rebind surrounding operators.
    Fragment(String),
}

impl SqlExpr {
    /// Qualified column reference.
    pub fn column(qualifier: &str, name: &str) -> Self {
        Self::Column {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
        }
    }

    /// String literal.
    pub fn string(value: &str) -> Self {
        Self::Str(value.to_string())
    }

    /// Function call.
    pub fn func(name: &str, args: Vec<SqlExpr>) -> Self {
        Self::Func {
            name: name.to_string(),
            args,
        }
    }

    /// `CAST(self AS target)`.
    pub fn cast(self, target: &str) -> Self {
        Self::Cast {
            expr: Box::new(self),
            target: target.to_string(),
        }
    }

    /// `TRY_CAST(self AS target)`.
    pub fn try_cast(self, target: &str) -> Self {
        Self::TryCast {
            expr: Box::new(self),
            target: target.to_string(),
        }
    }

    /// Typed literal such as `DATE '1970-01-01'`.
    pub fn typed(type_name: &str, value: &str) -> Self {
        Self::Typed {
            type_name: type_name.to_string(),
            value: value.to_string(),
        }
    }

    /// Binary operation helper.
    pub fn binary(self, op: BinaryOp, right: SqlExpr) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    /// `self = right`.
    pub fn equals(self, right: SqlExpr) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    /// Fold predicates with `AND`; `None` when the input is empty.
    pub fn and_all(predicates: impl IntoIterator<Item = SqlExpr>) -> Option<Self> {
        predicates
            .into_iter()
            .reduce(|acc, next| acc.binary(BinaryOp::And, next))
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    /// Sort expression.
    pub expr: SqlExpr,
    /// `DESC` when true.
    pub descending: bool,
    /// Emit `NULLS LAST`.
    pub nulls_last: bool,
}

impl OrderKey {
    /// Descending key with nulls sorted after every value.
    pub fn desc(expr: SqlExpr) -> Self {
        Self {
            expr,
            descending: true,
            nulls_last: true,
        }
    }
}

/// A projected item in a `SELECT` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    /// `*` or `alias.*`.
    Wildcard(Option<String>),
    /// `expr [AS "alias"]`.
    Expr {
        /// Projected value.
        expr: SqlExpr,
        /// Output column name.
        alias: Option<String>,
    },
}

/// Relation read by a `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// A catalog table or view.
    Table(RelationLocator),
    /// A name bound by a preceding CTE.
    Cte(String),
}

/// A single-relation `SELECT` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Projection list.
    pub projection: Vec<SelectItem>,
    /// Relation in `FROM`.
    pub from: Relation,
    /// Alias for the relation.
    pub alias: Option<String>,
    /// `WHERE` predicate.
    pub filter: Option<SqlExpr>,
}

/// Named common table expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cte {
    /// CTE name.
    pub name: String,
    /// CTE body.
    pub query: Select,
}

/// The `USING (...)` subquery: optional CTE chain and a final `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    /// CTEs in definition order.
    pub ctes: Vec<Cte>,
    /// Final projection.
    pub body: Select,
}

/// `"column" = expr` in `UPDATE SET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetItem {
    /// Destination column.
    pub column: String,
    /// Assigned value.
    pub value: SqlExpr,
}

/// Complete `MERGE INTO` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStatement {
    /// Destination relation.
    pub target: RelationLocator,
    /// Destination alias (`t`).
    pub target_alias: String,
    /// Source subquery.
    pub source: SourceQuery,
    /// Source alias (`s`).
    pub source_alias: String,
    /// Match predicate.
    pub on: SqlExpr,
    /// `WHEN MATCHED AND <guard>`.
    pub matched_guard: Option<SqlExpr>,
    /// Update assignments; never empty.
    pub set: Vec<SetItem>,
    /// Insert column list.
    pub insert_columns: Vec<String>,
    /// Insert values, aligned with `insert_columns`.
    pub insert_values: Vec<SqlExpr>,
}
