use std::fmt::Write;

use crate::config::MergeSpec;
use crate::generator::merge_generator::CompiledStatement;
use crate::generator::notice::NoticeLevel;

/// Build a markdown summary of one compiled merge.
pub fn build_report(spec: &MergeSpec, compiled: &CompiledStatement) -> String {
    let mut report = String::new();

    let _ = writeln!(report, "# stage2merge Merge Report");
    let _ = writeln!(report);
    let _ = writeln!(report, "| Setting | Value |");
    let _ = writeln!(report, "|---------|-------|");
    let _ = writeln!(report, "| Destination | `{}` |", spec.destination);
    let _ = writeln!(report, "| Source | `{}` |", spec.source);
    let _ = writeln!(report, "| Primary key | {} |", code_list(&spec.primary_key));
    let _ = writeln!(
        report,
        "| Recency column | {} |",
        spec.recency_column()
            .map_or_else(|| "none".to_string(), |c| format!("`{c}`"))
    );
    let _ = writeln!(
        report,
        "| Dedup | {} |",
        if spec.dedup.enabled { "on" } else { "off" }
    );
    let _ = writeln!(
        report,
        "| Update guard | {} |",
        if compiled.plan().matched_guard.is_some() {
            "on"
        } else {
            "off"
        }
    );

    let _ = writeln!(report);
    let _ = writeln!(report, "## Columns");
    let _ = writeln!(report);
    let _ = writeln!(report, "- Merged: {}", code_list(compiled.merged_columns()));
    if !compiled.ignored_columns().is_empty() {
        let _ = writeln!(report, "- Ignored: {}", code_list(compiled.ignored_columns()));
    }

    if !compiled.notices().is_empty() {
        let _ = writeln!(report);
        let _ = writeln!(report, "## Notices");
        let _ = writeln!(report);
        for notice in compiled.notices() {
            let level = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Warning => "warning",
            };
            let _ = writeln!(report, "- **[{level}]** {}: {}", notice.kind, notice.message);
        }
    }

    report
}

fn code_list(items: &[String]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ")
}
