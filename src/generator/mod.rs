/// Per-column cast and normalization expressions.
pub mod cast_compiler;
/// Deterministic per-key ranking of duplicate source rows.
pub mod dedup;
/// Typed expression and statement intermediate representation.
pub mod ir;
/// Merge composition: match predicate, guard, window, assignments, insert projection.
pub mod merge_generator;
/// Non-fatal diagnostics collected during compilation.
pub mod notice;
/// Rendering of the intermediate representation to SQL text.
pub mod render;
