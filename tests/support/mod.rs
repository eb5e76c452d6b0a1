#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use regex::{NoExpand, Regex};
use stage2merge::config::{parse_window_bound, MergeSpec};
use stage2merge::generator::cast_compiler::CompileContext;
use stage2merge::generator::dedup::RankingClause;
use stage2merge::generator::ir::{BinaryOp, SqlExpr};
use stage2merge::schema::catalog::InMemoryCatalog;
use stage2merge::schema::locator::RelationLocator;
use stage2merge::schema::types::TypeClass;

pub(crate) fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(name)
}

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{nanos}"))
}

pub(crate) fn people_destination() -> RelationLocator {
    RelationLocator::new("silver", "people")
}

pub(crate) fn people_source() -> RelationLocator {
    RelationLocator::new("stg", "people")
}

/// Typed destination plus an all-varchar staging copy with one extra column.
pub(crate) fn people_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_relation(
            people_destination(),
            [
                ("id", "bigint"),
                ("name", "varchar"),
                ("score", "decimal(10,2)"),
                ("active", "boolean"),
                ("updated_at", "timestamp(6)"),
                ("__op", "varchar"),
                ("__ts_ms", "timestamp(3)"),
            ],
        )
        .with_relation(
            people_source(),
            [
                ("id", "varchar"),
                ("name", "varchar"),
                ("score", "varchar"),
                ("active", "varchar"),
                ("updated_at", "varchar"),
                ("nickname", "varchar"),
            ],
        )
}

pub(crate) fn people_spec() -> MergeSpec {
    MergeSpec::new(people_source(), people_destination(), &["id"])
}

pub(crate) fn context(spec: &MergeSpec) -> CompileContext<'_> {
    CompileContext {
        source_alias: &spec.source_alias,
        target_alias: &spec.target_alias,
        op_literal: &spec.op_literal,
        provenance: &spec.provenance,
    }
}

/// A runtime value as the engine would see it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(NaiveDateTime),
}

impl Value {
    pub(crate) fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub(crate) fn time(value: &str) -> Self {
        Self::Time(parse_window_bound(value).expect("test timestamp should parse"))
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(v) => Some(v.clone()),
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Bool(v) => Some(v.to_string()),
            Self::Time(v) => Some(v.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
        }
    }
}

/// Column values keyed by `qualifier.column`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Row(HashMap<String, Value>);

impl Row {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, qualifier: &str, column: &str, value: Value) -> Self {
        self.0.insert(format!("{qualifier}.{column}"), value);
        self
    }

    fn get(&self, qualifier: Option<&str>, name: &str) -> Value {
        let key = match qualifier {
            Some(q) => format!("{q}.{name}"),
            None => name.to_string(),
        };
        self.0.get(&key).cloned().unwrap_or(Value::Null)
    }
}

/// Evaluate a compiled expression over one row, with the engine's NULL rules
/// and `TRY_CAST` semantics for both cast forms.
pub(crate) fn eval(expr: &SqlExpr, row: &Row) -> Value {
    match expr {
        SqlExpr::Column { qualifier, name } => row.get(qualifier.as_deref(), name),
        SqlExpr::Str(value) => Value::Text(value.clone()),
        SqlExpr::Int(value) => Value::Int(*value),
        SqlExpr::Bool(value) => Value::Bool(*value),
        SqlExpr::Null => Value::Null,
        SqlExpr::Typed { type_name, value } => cast(Value::Text(value.clone()), type_name),
        SqlExpr::Cast { expr, target } | SqlExpr::TryCast { expr, target } => {
            cast(eval(expr, row), target)
        }
        SqlExpr::Func { name, args } => {
            let args: Vec<Value> = args.iter().map(|arg| eval(arg, row)).collect();
            call(name, &args)
        }
        SqlExpr::Binary { left, op, right } => binary(eval(left, row), *op, eval(right, row)),
        SqlExpr::Case {
            branches,
            otherwise,
        } => {
            for (condition, result) in branches {
                if eval(condition, row) == Value::Bool(true) {
                    return eval(result, row);
                }
            }
            otherwise
                .as_ref()
                .map_or(Value::Null, |otherwise| eval(otherwise, row))
        }
        SqlExpr::InList { expr, list } => {
            let value = eval(expr, row);
            if value == Value::Null {
                return Value::Null;
            }
            Value::Bool(
                list.iter()
                    .any(|item| compare(&value, &eval(item, row)) == Some(Ordering::Equal)),
            )
        }
        SqlExpr::IsNull(expr) => Value::Bool(eval(expr, row) == Value::Null),
        other => panic!("expression cannot be evaluated offline: {other:?}"),
    }
}

fn cast(value: Value, target: &str) -> Value {
    let Some(text) = value.as_text() else {
        return Value::Null;
    };
    let text = text.trim();
    match TypeClass::classify(target) {
        TypeClass::Integer => match value {
            Value::Int(v) => Value::Int(v),
            _ => text.parse().map_or(Value::Null, Value::Int),
        },
        TypeClass::Decimal => match value {
            Value::Float(v) => Value::Float(v),
            Value::Int(v) => Value::Float(v as f64),
            _ => text.parse().map_or(Value::Null, Value::Float),
        },
        TypeClass::Boolean => match value {
            Value::Bool(v) => Value::Bool(v),
            _ => match text.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Null,
            },
        },
        TypeClass::Date => {
            let date = match value {
                Value::Time(v) => Some(v.date()),
                _ => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok(),
            };
            date.and_then(|d| d.and_hms_opt(0, 0, 0))
                .map_or(Value::Null, Value::Time)
        }
        TypeClass::Timestamp => match value {
            Value::Time(v) => Value::Time(v),
            _ => parse_window_bound(text).map_or(Value::Null, Value::Time),
        },
        TypeClass::String | TypeClass::Other => Value::Text(text.to_string()),
    }
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("pattern {pattern} should compile: {e}"))
}

fn call(name: &str, args: &[Value]) -> Value {
    let text = |idx: usize| args.get(idx).and_then(Value::as_text);
    match name.to_ascii_uppercase().as_str() {
        "COALESCE" => args
            .iter()
            .find(|v| **v != Value::Null)
            .cloned()
            .unwrap_or(Value::Null),
        "NULLIF" => {
            if compare(&args[0], &args[1]) == Some(Ordering::Equal) {
                Value::Null
            } else {
                args[0].clone()
            }
        }
        "TRIM" => text(0).map_or(Value::Null, |s| Value::Text(s.trim().to_string())),
        "LOWER" => text(0).map_or(Value::Null, |s| Value::Text(s.to_lowercase())),
        "REPLACE" => match (text(0), text(1), text(2)) {
            (Some(s), Some(from), Some(to)) => Value::Text(s.replace(&from, &to)),
            _ => Value::Null,
        },
        "SPLIT_PART" => match (text(0), text(1), &args[2]) {
            (Some(s), Some(delimiter), Value::Int(idx)) => s
                .split(delimiter.as_str())
                .nth(usize::try_from(*idx - 1).expect("split index is 1-based"))
                .map_or(Value::Null, |part| Value::Text(part.to_string())),
            _ => Value::Null,
        },
        "REGEXP_REPLACE" => match (text(0), text(1), text(2)) {
            (Some(s), Some(pattern), Some(with)) => Value::Text(
                regex(&pattern)
                    .replace_all(&s, NoExpand(&with))
                    .into_owned(),
            ),
            _ => Value::Null,
        },
        "REGEXP_EXTRACT" => match (text(0), text(1)) {
            (Some(s), Some(pattern)) => regex(&pattern)
                .find(&s)
                .map_or(Value::Null, |m| Value::Text(m.as_str().to_string())),
            _ => Value::Null,
        },
        "REGEXP_LIKE" => match (text(0), text(1)) {
            (Some(s), Some(pattern)) => Value::Bool(regex(&pattern).is_match(&s)),
            _ => Value::Null,
        },
        other => panic!("function {other} cannot be evaluated offline"),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

fn binary(left: Value, op: BinaryOp, right: Value) -> Value {
    match op {
        BinaryOp::And => match (&left, &right) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
            (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
            _ => Value::Null,
        },
        BinaryOp::Or => match (&left, &right) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
            (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
            _ => Value::Null,
        },
        BinaryOp::Eq | BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::Lt => {
            let Some(ord) = compare(&left, &right) else {
                return Value::Null;
            };
            Value::Bool(match op {
                BinaryOp::Eq => ord == Ordering::Equal,
                BinaryOp::Gt => ord == Ordering::Greater,
                BinaryOp::GtEq => ord != Ordering::Less,
                _ => ord == Ordering::Less,
            })
        }
    }
}

fn order_rows(clause: &RankingClause, a: &Row, b: &Row) -> Ordering {
    for key in &clause.order_by {
        let (x, y) = (eval(&key.expr, a), eval(&key.expr, b));
        let ord = match (&x, &y) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) if key.nulls_last => Ordering::Greater,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) if key.nulls_last => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => {
                let ord = compare(&x, &y).unwrap_or(Ordering::Equal);
                if key.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Rows ranked first within their partition, in first-seen partition order.
pub(crate) fn surviving_rows(clause: &RankingClause, rows: &[Row]) -> Vec<Row> {
    let mut partitions: Vec<(Vec<Value>, Vec<&Row>)> = Vec::new();
    for row in rows {
        let key: Vec<Value> = clause.partition_by.iter().map(|e| eval(e, row)).collect();
        match partitions.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => partitions.push((key, vec![row])),
        }
    }
    partitions
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_by(|a, b| order_rows(clause, a, b));
            members[0].clone()
        })
        .collect()
}

/// Read a column back out of a row built with [`Row::with`].
pub(crate) fn column(row: &Row, qualifier: &str, name: &str) -> Value {
    row.get(Some(qualifier), name)
}
