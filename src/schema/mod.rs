/// Catalog providers: the lookup trait plus in-memory, JSON, and DDL-backed catalogs.
pub mod catalog;
/// Relation locators with optional catalog qualification.
pub mod locator;
/// Schema resolution against a catalog provider.
pub mod resolver;
/// Type classes, destination schemas, and source column sets.
pub mod types;
