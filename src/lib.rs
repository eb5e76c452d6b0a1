//! Compile schema-aware incremental `MERGE` statements that load staged rows into Iceberg tables.
#![warn(missing_docs)]

/// Merge run configuration: relations, key, recency, window, and escape hatches.
pub mod config;
/// Library error type.
pub mod error;
/// Statement submission through a query execution seam.
pub mod execution;
/// Typed statement model, value normalization, dedup ranking, and rendering.
pub mod generator;
/// File output and markdown report generation.
pub mod output;
/// Identifier handling, fragment validation, and DDL parsing.
pub mod parser;
/// Source-to-destination column reconciliation and positional alignment.
pub mod reconcile;
/// Relation locators, catalog providers, and destination schemas.
pub mod schema;

pub use config::MergeSpec;
pub use error::{MergeError, Result};
pub use generator::merge_generator::{compile_merge, CompiledStatement};
