use tracing::debug;

use crate::error::{MergeError, Result};
use crate::parser::names::normalize_identifier;
use crate::schema::catalog::CatalogProvider;
use crate::schema::locator::RelationLocator;
use crate::schema::types::{ColumnSet, DestinationSchema};

/// Resolve a destination relation's column types.
///
/// Fails with [`MergeError::SchemaNotFound`] when the catalog returns no
/// columns, which is usually a mistyped database or table name.
pub fn resolve<C: CatalogProvider + ?Sized>(
    catalog: &C,
    locator: &RelationLocator,
) -> Result<DestinationSchema> {
    let columns = catalog.list_column_types(locator)?;
    let schema = DestinationSchema::from_pairs(columns);
    if schema.is_empty() {
        return Err(MergeError::SchemaNotFound {
            locator: locator.to_string(),
        });
    }
    debug!(relation = %locator, columns = schema.len(), "resolved destination schema");
    Ok(schema)
}

/// Resolve a source relation's column names, trimmed and lower-cased.
pub fn resolve_columns<C: CatalogProvider + ?Sized>(
    catalog: &C,
    locator: &RelationLocator,
) -> Result<ColumnSet> {
    let columns: Vec<String> = catalog
        .list_columns(locator)?
        .iter()
        .map(|c| normalize_identifier(c))
        .filter(|c| !c.is_empty())
        .collect();
    if columns.is_empty() {
        return Err(MergeError::SchemaNotFound {
            locator: locator.to_string(),
        });
    }
    debug!(relation = %locator, columns = columns.len(), "resolved source columns");
    Ok(ColumnSet::from(columns))
}
