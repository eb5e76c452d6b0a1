//! Merge run configuration.
//!
//! A [`MergeSpec`] is built from caller configuration (JSON file, CLI flags,
//! or the builder methods) before any catalog lookup happens.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};
use crate::parser::expr::{extract_column_name, parse_fragment, validate_fragment};
use crate::parser::names::{dedupe_preserve_order, normalize_identifier};
use crate::schema::locator::RelationLocator;

/// Trailing window applied over the recency column when no explicit window is set.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

fn default_recency_column() -> Option<String> {
    Some("updated_at".to_string())
}

fn default_op_literal() -> String {
    "backfill".to_string()
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

fn default_target_alias() -> String {
    "t".to_string()
}

fn default_source_alias() -> String {
    "s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_created_column() -> Option<String> {
    Some("created_at".to_string())
}

/// Caller-supplied `column = expression` pair.
///
/// The expression is spliced into the statement verbatim after it passes
/// parse validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Destination column.
    pub column: String,
    /// SQL expression text.
    pub expression: String,
}

impl Assignment {
    /// Pair a column with an expression.
    pub fn new(column: &str, expression: &str) -> Self {
        Self {
            column: normalize_identifier(column),
            expression: expression.trim().to_string(),
        }
    }

    /// Parse `column = expression`, e.g. `"note" = 'manual fix'`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| MergeError::InvalidFragment {
            fragment: raw.to_string(),
            reason: reason.to_string(),
        };
        let (left, right) = raw
            .split_once('=')
            .ok_or_else(|| invalid("expected `column = expression`"))?;
        let column = extract_column_name(&parse_fragment(left)?)
            .ok_or_else(|| invalid("left-hand side is not a column"))?;
        let expression = validate_fragment(right)?;
        Ok(Self::new(&column, &expression))
    }
}

/// Source dedup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Keep one row per primary key before matching.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra ordering columns, all descending, after the recency key.
    #[serde(default)]
    pub tiebreakers: Vec<String>,
    /// Conventional creation timestamp used when the recency value is NULL.
    #[serde(default = "default_created_column")]
    pub created_column: Option<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tiebreakers: Vec::new(),
            created_column: default_created_column(),
        }
    }
}

/// Names and zone for the synthetic provenance columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    /// Column receiving the operation tag literal.
    pub op_column: String,
    /// Column receiving the ingestion timestamp.
    pub timestamp_column: String,
    /// Zone the ingestion timestamp is rendered in.
    pub time_zone: String,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            op_column: "__op".to_string(),
            timestamp_column: "__ts_ms".to_string(),
            time_zone: "Asia/Jakarta".to_string(),
        }
    }
}

impl ProvenanceConfig {
    /// True when `column` is one of the two provenance columns.
    pub fn is_provenance(&self, column: &str) -> bool {
        let column = normalize_identifier(column);
        column == normalize_identifier(&self.op_column)
            || column == normalize_identifier(&self.timestamp_column)
    }
}

/// `[start, end)` restriction on a timestamp-like source column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFilter {
    /// Filtered column; the recency column when unset.
    #[serde(default)]
    pub column: Option<String>,
    /// Inclusive lower bound.
    #[serde(default)]
    pub start: Option<String>,
    /// Exclusive upper bound.
    #[serde(default)]
    pub end: Option<String>,
}

/// Parsed window bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    /// Inclusive lower bound.
    pub start: Option<NaiveDateTime>,
    /// Exclusive upper bound.
    pub end: Option<NaiveDateTime>,
}

impl WindowFilter {
    /// Window over the recency column.
    pub fn between(start: &str, end: &str) -> Self {
        Self {
            column: None,
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        }
    }

    /// Filter a specific column instead of the recency column.
    pub fn on_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    /// Parse and check the bounds: at least one bound, and `end > start`.
    pub fn bounds(&self) -> Result<WindowBounds> {
        let start = self.start.as_deref().map(parse_window_bound).transpose()?;
        let end = self.end.as_deref().map(parse_window_bound).transpose()?;

        match (start, end) {
            (None, None) => Err(MergeError::Config(
                "window filter needs a start or an end bound".to_string(),
            )),
            (Some(s), Some(e)) if e <= s => Err(MergeError::InvalidWindow {
                start: self.start.clone().unwrap_or_default(),
                end: self.end.clone().unwrap_or_default(),
            }),
            _ => Ok(WindowBounds { start, end }),
        }
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD[ T]HH:MM:SS[.fff]`.
pub fn parse_window_bound(raw: &str) -> Result<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(MergeError::InvalidWindowBound {
            value: raw.to_string(),
            reason: "bound is empty".to_string(),
        });
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| MergeError::InvalidWindowBound {
            value: raw.to_string(),
            reason: "expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS".to_string(),
        })
}

/// Full configuration of one merge run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpec {
    /// Staged relation providing candidate rows.
    pub source: RelationLocator,
    /// Versioned relation being kept up to date.
    pub destination: RelationLocator,
    /// Match key, order-preserving and de-duplicated.
    pub primary_key: Vec<String>,
    /// Freshness column for the update guard, dedup, and default lookback.
    #[serde(default = "default_recency_column")]
    pub recency_column: Option<String>,
    /// Literal written to the operation-tag provenance column.
    #[serde(default = "default_op_literal")]
    pub op_literal: String,
    /// Columns never touched by `UPDATE SET`.
    #[serde(default)]
    pub exclude_update: Vec<String>,
    /// Predicates ANDed into the match condition.
    #[serde(default)]
    pub extra_on: Vec<String>,
    /// Extra `UPDATE SET` assignments.
    #[serde(default)]
    pub extra_set: Vec<Assignment>,
    /// Extra insert-only columns or insert value overrides.
    #[serde(default)]
    pub extra_insert: Vec<Assignment>,
    /// Source dedup settings.
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Explicit `[start, end)` source window.
    #[serde(default)]
    pub window: Option<WindowFilter>,
    /// Default trailing window in days when no explicit window is set; 0 disables.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Provenance column names and zone.
    #[serde(default)]
    pub provenance: ProvenanceConfig,
    /// Treat source columns as unlabeled positions and align them onto the destination.
    #[serde(default)]
    pub align_positional: bool,
    /// Destination alias in the statement.
    #[serde(default = "default_target_alias")]
    pub target_alias: String,
    /// Source alias in the statement.
    #[serde(default = "default_source_alias")]
    pub source_alias: String,
}

impl MergeSpec {
    /// Spec with defaults for everything but the relations and the key.
    pub fn new<S: AsRef<str>>(
        source: RelationLocator,
        destination: RelationLocator,
        primary_key: &[S],
    ) -> Self {
        Self {
            source,
            destination,
            primary_key: normalize_key(primary_key),
            recency_column: default_recency_column(),
            op_literal: default_op_literal(),
            exclude_update: Vec::new(),
            extra_on: Vec::new(),
            extra_set: Vec::new(),
            extra_insert: Vec::new(),
            dedup: DedupConfig::default(),
            window: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            provenance: ProvenanceConfig::default(),
            align_positional: false,
            target_alias: default_target_alias(),
            source_alias: default_source_alias(),
        }
    }

    /// Parse a JSON spec, normalize the key, and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut spec: Self = serde_json::from_str(json)?;
        spec.primary_key = normalize_key(&spec.primary_key);
        spec.validate()?;
        Ok(spec)
    }

    /// Load a JSON spec file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MergeError::Io(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Set or clear the recency column; a blank name clears it.
    pub fn with_recency_column(mut self, column: Option<&str>) -> Self {
        self.recency_column = column
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);
        self
    }

    /// Operation tag literal.
    pub fn with_op_literal(mut self, literal: &str) -> Self {
        self.op_literal = literal.to_string();
        self
    }

    /// Columns excluded from `UPDATE SET`.
    pub fn with_excluded_update<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.exclude_update = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Add a match predicate.
    pub fn with_extra_on(mut self, predicate: &str) -> Self {
        self.extra_on.push(predicate.to_string());
        self
    }

    /// Add an update assignment.
    pub fn with_extra_set(mut self, column: &str, expression: &str) -> Self {
        self.extra_set.push(Assignment::new(column, expression));
        self
    }

    /// Add an insert-only column or override an insert value.
    pub fn with_extra_insert(mut self, column: &str, expression: &str) -> Self {
        self.extra_insert.push(Assignment::new(column, expression));
        self
    }

    /// Toggle source dedup.
    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup.enabled = enabled;
        self
    }

    /// Dedup tie-breaker columns.
    pub fn with_tiebreakers<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.dedup.tiebreakers = dedupe_preserve_order(columns);
        self
    }

    /// Explicit source window.
    pub fn with_window(mut self, window: WindowFilter) -> Self {
        self.window = Some(window);
        self
    }

    /// Default lookback length in days; 0 disables it.
    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Provenance settings.
    pub fn with_provenance(mut self, provenance: ProvenanceConfig) -> Self {
        self.provenance = provenance;
        self
    }

    /// Toggle positional alignment of source columns.
    pub fn with_positional_alignment(mut self, enabled: bool) -> Self {
        self.align_positional = enabled;
        self
    }

    /// Recency column, ignoring blank configuration.
    pub fn recency_column(&self) -> Option<&str> {
        self.recency_column
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Check everything that can be checked without the catalog.
    pub fn validate(&self) -> Result<()> {
        if self.primary_key.iter().all(|c| c.trim().is_empty()) {
            return Err(MergeError::EmptyPrimaryKey);
        }
        if let Some(window) = &self.window {
            window.bounds()?;
        }
        for predicate in &self.extra_on {
            validate_fragment(predicate)?;
        }
        for assignment in self.extra_set.iter().chain(&self.extra_insert) {
            validate_fragment(&assignment.expression)?;
        }
        for alias in [&self.target_alias, &self.source_alias] {
            if !is_simple_alias(alias) {
                return Err(MergeError::Config(format!(
                    "relation alias {alias:?} must be a plain identifier"
                )));
            }
        }
        if self.target_alias.eq_ignore_ascii_case(&self.source_alias) {
            return Err(MergeError::Config(
                "target and source aliases must differ".to_string(),
            ));
        }
        Ok(())
    }
}

fn normalize_key<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    dedupe_preserve_order(columns)
        .iter()
        .map(|c| normalize_identifier(c))
        .collect()
}

fn is_simple_alias(alias: &str) -> bool {
    let mut chars = alias.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
