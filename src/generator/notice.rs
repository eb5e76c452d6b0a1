use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

/// Severity of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Expected degradation, e.g. staging-only columns ignored.
    Info,
    /// Behavior differs from what the caller configured.
    Warning,
}

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Source columns absent from the destination were left out.
    IgnoredColumns,
    /// Positional alignment fell back to tail or prefix mapping.
    AlignmentFallback,
    /// Window filter column absent from the source; filter dropped.
    FilterDropped,
    /// Extra assignment targets a column the destination lacks.
    SkippedAssignment,
    /// Recency column exists in the destination but not in the source.
    RecencyNotInSource,
    /// Dedup tie-breaker column absent from the source.
    SkippedTiebreaker,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IgnoredColumns => "ignored-columns",
            Self::AlignmentFallback => "alignment-fallback",
            Self::FilterDropped => "filter-dropped",
            Self::SkippedAssignment => "skipped-assignment",
            Self::RecencyNotInSource => "recency-not-in-source",
            Self::SkippedTiebreaker => "skipped-tiebreaker",
        };
        f.write_str(name)
    }
}

/// A non-fatal diagnostic produced while compiling a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Category.
    pub kind: NoticeKind,
    /// Human-readable detail.
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Ordered notice collector that also logs through `tracing`.
///
/// Identical notices are recorded and logged once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notices(Vec<Notice>);

impl Notices {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational notice.
    pub fn info(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.record(NoticeLevel::Info, kind, message.into());
    }

    /// Record a warning.
    pub fn warn(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.record(NoticeLevel::Warning, kind, message.into());
    }

    fn record(&mut self, level: NoticeLevel, kind: NoticeKind, message: String) {
        if self.0.iter().any(|n| n.kind == kind && n.message == message) {
            return;
        }
        match level {
            NoticeLevel::Info => info!(kind = %kind, "{message}"),
            NoticeLevel::Warning => warn!(kind = %kind, "{message}"),
        }
        self.0.push(Notice {
            level,
            kind,
            message,
        });
    }

    /// Append notices collected elsewhere, keeping the once-only rule.
    pub fn extend(&mut self, other: Notices) {
        for notice in other.0 {
            if !self.0.contains(&notice) {
                self.0.push(notice);
            }
        }
    }

    /// Iterate in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.0.iter()
    }

    /// Number of warnings (informational notices excluded).
    pub fn warning_count(&self) -> usize {
        self.0
            .iter()
            .filter(|n| n.level == NoticeLevel::Warning)
            .count()
    }

    /// Number of notices of `kind`.
    pub fn count_of(&self, kind: NoticeKind) -> usize {
        self.0.iter().filter(|n| n.kind == kind).count()
    }

    /// Consume into the recorded list.
    pub fn into_vec(self) -> Vec<Notice> {
        self.0
    }
}
