use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};
use crate::generator::render::quote_qualified;
use crate::parser::names::split_qualified_name;

/// Fully qualified relation name: optional catalog, database, table.
///
/// Serialized as its quoted dotted form, e.g. `"AwsDataCatalog"."silver"."orders"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelationLocator {
    catalog: Option<String>,
    database: String,
    table: String,
}

impl RelationLocator {
    /// Build a locator from a database and a table.
    ///
    /// A table given as `schema.table` overrides `database`, so callers can
    /// pass staging tables that live in a different database.
    pub fn new(database: &str, table: &str) -> Self {
        let parts = split_qualified_name(table);
        let (database, table) = match parts.as_slice() {
            [db, tbl] if !db.is_empty() && !tbl.is_empty() => (db.clone(), tbl.clone()),
            _ => (database.trim().to_string(), table.trim().to_string()),
        };
        Self {
            catalog: None,
            database,
            table,
        }
    }

    /// Parse `db.table` or `catalog.db.table`; quoted parts may contain dots.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_parts(&split_qualified_name(name))
            .ok_or_else(|| MergeError::InvalidLocator(name.to_string()))
    }

    /// Build from already unquoted `[db, table]` or `[catalog, db, table]`.
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Option<Self> {
        if parts.iter().any(|p| p.as_ref().is_empty()) {
            return None;
        }
        match parts {
            [database, table] => Some(Self {
                catalog: None,
                database: database.as_ref().to_string(),
                table: table.as_ref().to_string(),
            }),
            [catalog, database, table] => Some(Self {
                catalog: Some(catalog.as_ref().to_string()),
                database: database.as_ref().to_string(),
                table: table.as_ref().to_string(),
            }),
            _ => None,
        }
    }

    /// Set the catalog prefix; a blank catalog removes it.
    pub fn with_catalog(mut self, catalog: &str) -> Self {
        let catalog = catalog.trim();
        self.catalog = (!catalog.is_empty()).then(|| catalog.to_string());
        self
    }

    /// Catalog prefix, if any.
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    /// Database (schema) name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Table or view name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Unquoted parts in order, catalog first when present.
    pub fn parts(&self) -> Vec<&str> {
        let mut parts = Vec::with_capacity(3);
        if let Some(catalog) = &self.catalog {
            parts.push(catalog.as_str());
        }
        parts.push(self.database.as_str());
        parts.push(self.table.as_str());
        parts
    }
}

impl fmt::Display for RelationLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote_qualified(&self.parts()))
    }
}

impl TryFrom<String> for RelationLocator {
    type Error = MergeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RelationLocator> for String {
    fn from(locator: RelationLocator) -> Self {
        locator.to_string()
    }
}
