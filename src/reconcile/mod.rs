/// Name-based reconciliation of source columns against the destination.
pub mod columns;
/// Alignment of unlabeled column positions onto target names.
pub mod positional;
