use std::path::{Component, Path, PathBuf};

use crate::config::MergeSpec;
use crate::error::{MergeError, Result};
use crate::generator::merge_generator::CompiledStatement;
use crate::output::report;

/// Paths written by [`write_output`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    /// `<name>_merge.sql`.
    pub statement: PathBuf,
    /// `<name>_report.md`.
    pub report: PathBuf,
}

/// Write the statement and its report to `output_dir`.
pub fn write_output(
    output_dir: &Path,
    name: &str,
    spec: &MergeSpec,
    compiled: &CompiledStatement,
) -> Result<WrittenFiles> {
    validate_output_name(name)?;

    std::fs::create_dir_all(output_dir)
        .map_err(|e| MergeError::Io(format!("Failed to create output directory: {e}")))?;

    let statement = output_dir.join(format!("{name}_merge.sql"));
    std::fs::write(&statement, format!("{};\n", compiled.sql()))
        .map_err(|e| MergeError::Io(format!("Failed to write {}: {e}", statement.display())))?;

    let report_path = output_dir.join(format!("{name}_report.md"));
    std::fs::write(&report_path, report::build_report(spec, compiled))
        .map_err(|e| MergeError::Io(format!("Failed to write {}: {e}", report_path.display())))?;

    Ok(WrittenFiles {
        statement,
        report: report_path,
    })
}

fn validate_output_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| MergeError::Config(format!("Invalid output name '{name}': {reason}"));

    if name.trim().is_empty() {
        return Err(MergeError::Config("Output name must not be empty".to_string()));
    }
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return Err(invalid("absolute paths are not allowed"));
    }
    if candidate.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return Err(invalid("traversal segments are not allowed"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("path separators are not allowed"));
    }
    Ok(())
}
