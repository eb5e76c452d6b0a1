/// `CREATE TABLE` parsing for DDL-backed catalogs.
pub mod ddl;
/// Validation of caller-supplied SQL fragments.
pub mod expr;
/// Identifier normalization, qualified-name splitting, and column-name sanitization.
pub mod names;
