use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::names::normalize_identifier;

/// Semantic category of a destination column type.
///
/// The class picks the normalization rule applied to the source value; the
/// declared type text is still used as the cast target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    /// `tinyint`, `smallint`, `int`, `integer`, `bigint`.
    Integer,
    /// `decimal(p,s)`, `numeric`, `double`, `real`, `float`.
    Decimal,
    /// `boolean`, `bool`.
    Boolean,
    /// `date`.
    Date,
    /// Any `timestamp*` type.
    Timestamp,
    /// `varchar`, `char`, `string`, `text`.
    String,
    /// Anything else (arrays, maps, structs, binary).
    Other,
}

impl TypeClass {
    /// Classify an engine type name such as `decimal(10,2)` or `timestamp(6)`.
    pub fn classify(declared: &str) -> Self {
        let t = declared.trim().to_ascii_lowercase();
        let base = t.split('(').next().unwrap_or_default().trim();

        match base {
            "tinyint" | "smallint" | "int" | "integer" | "bigint" | "int2" | "int4" | "int8" => {
                Self::Integer
            }
            "double" | "real" | "float" | "double precision" | "float4" | "float8" => {
                Self::Decimal
            }
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "string" | "text" => Self::String,
            _ if base.starts_with("decimal") || base.starts_with("numeric") => Self::Decimal,
            _ if base.starts_with("timestamp") => Self::Timestamp,
            _ if base.starts_with("varchar") || base.starts_with("char") => Self::String,
            _ => Self::Other,
        }
    }

    /// True for the date/timestamp family.
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::String => "string",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A destination column's declared type together with its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    /// Lower-cased declared type text, e.g. `decimal(18,2)`.
    pub declared: String,
    /// Normalization class derived from `declared`.
    pub class: TypeClass,
}

impl ColumnType {
    /// Build a column type from the engine's type string.
    pub fn new(declared: &str) -> Self {
        let declared = declared.trim().to_ascii_lowercase();
        let class = TypeClass::classify(&declared);
        Self { declared, class }
    }

    /// Type text used in `CAST`/`TRY_CAST` targets.
    ///
    /// Every timestamp variant collapses to plain `timestamp` so casts never
    /// depend on precision or zone suffixes; an empty declaration falls back
    /// to `varchar`.
    pub fn cast_target(&self) -> &str {
        if self.class == TypeClass::Timestamp {
            "timestamp"
        } else if self.declared.is_empty() {
            "varchar"
        } else {
            &self.declared
        }
    }
}

/// Ordered, case-insensitive mapping of destination columns to their types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationSchema {
    columns: Vec<(String, ColumnType)>,
    index: HashMap<String, usize>,
}

impl DestinationSchema {
    /// Build a schema from `(name, type)` pairs in ordinal order.
    ///
    /// Names are trimmed and lower-cased; a repeated name keeps its first
    /// declaration.
    pub fn from_pairs<N, T>(pairs: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let mut schema = Self::default();
        for (name, declared) in pairs {
            let key = normalize_identifier(name.as_ref());
            if key.is_empty() || schema.index.contains_key(&key) {
                continue;
            }
            schema.index.insert(key.clone(), schema.columns.len());
            schema
                .columns
                .push((key, ColumnType::new(declared.as_ref())));
        }
        schema
    }

    /// Look a column up case-insensitively.
    pub fn get(&self, column: &str) -> Option<&ColumnType> {
        self.index
            .get(&normalize_identifier(column))
            .map(|&idx| &self.columns[idx].1)
    }

    /// True when the destination defines `column`.
    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(&normalize_identifier(column))
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// `(name, type)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Ordered list of source column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSet(Vec<String>);

impl ColumnSet {
    /// Wrap column names as given.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self(columns.into_iter().map(Into::into).collect())
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, column: &str) -> bool {
        self.find(column).is_some()
    }

    /// Return the stored spelling of `column`, matched case-insensitively.
    pub fn find(&self, column: &str) -> Option<&str> {
        let wanted = normalize_identifier(column);
        self.0
            .iter()
            .find(|c| normalize_identifier(c) == wanted)
            .map(String::as_str)
    }

    /// Append a column name.
    pub fn push(&mut self, column: impl Into<String>) {
        self.0.push(column.into());
    }

    /// Iterate column names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Borrow the names as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for ColumnSet {
    fn from(columns: Vec<String>) -> Self {
        Self(columns)
    }
}
