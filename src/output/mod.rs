/// Writes the compiled statement and its report to disk.
pub mod formatter;
/// Builds a Markdown summary of a compiled merge.
pub mod report;
