use crate::config::ProvenanceConfig;
use crate::generator::notice::{NoticeKind, Notices};
use crate::parser::names::normalize_identifier;
use crate::schema::types::{ColumnSet, DestinationSchema};

/// Result of aligning source columns to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Columns the merge touches, lower-cased, in source order followed by
    /// any synthetic provenance columns.
    pub columns: Vec<String>,
    /// Source columns the destination does not define.
    pub ignored: Vec<String>,
    /// Diagnostics raised while reconciling.
    pub notices: Notices,
}

impl Reconciliation {
    /// True when `column` is part of the merge.
    pub fn contains(&self, column: &str) -> bool {
        let column = normalize_identifier(column);
        self.columns.iter().any(|c| *c == column)
    }
}

/// Keep the source columns the destination knows, then append the provenance
/// columns the destination defines.
pub fn reconcile(
    source: &ColumnSet,
    schema: &DestinationSchema,
    provenance: &ProvenanceConfig,
) -> Reconciliation {
    let mut out = Reconciliation::default();

    for raw in source.iter() {
        let column = normalize_identifier(raw);
        if column.is_empty() {
            continue;
        }
        if !schema.contains(&column) {
            out.ignored.push(raw.to_string());
        } else if !out.columns.contains(&column) {
            out.columns.push(column);
        }
    }

    for synthetic in [&provenance.op_column, &provenance.timestamp_column] {
        let column = normalize_identifier(synthetic);
        if schema.contains(&column) && !out.columns.contains(&column) {
            out.columns.push(column);
        }
    }

    if !out.ignored.is_empty() {
        out.notices.info(
            NoticeKind::IgnoredColumns,
            format!(
                "ignoring source columns not in destination: {:?}",
                out.ignored
            ),
        );
    }

    out
}
