use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{MergeError, Result};
use crate::parser::ddl::parse_create_tables;
use crate::schema::locator::RelationLocator;

/// Read-only column metadata source.
///
/// A relation that does not exist must come back as an empty list, not an
/// error, so the resolver can tell "not found" apart from a failing provider.
pub trait CatalogProvider {
    /// `(column, declared type)` pairs in ordinal order.
    fn list_column_types(&self, locator: &RelationLocator) -> Result<Vec<(String, String)>>;

    /// Column names in ordinal order.
    fn list_columns(&self, locator: &RelationLocator) -> Result<Vec<String>> {
        Ok(self
            .list_column_types(locator)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }
}

impl<C: CatalogProvider + ?Sized> CatalogProvider for &C {
    fn list_column_types(&self, locator: &RelationLocator) -> Result<Vec<(String, String)>> {
        (**self).list_column_types(locator)
    }

    fn list_columns(&self, locator: &RelationLocator) -> Result<Vec<String>> {
        (**self).list_columns(locator)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogColumn {
    name: String,
    #[serde(rename = "type", default)]
    data_type: String,
}

/// Catalog held in memory, filled programmatically, from JSON, or from DDL.
///
/// Lookups try the exact name first, then a case-insensitive match, and a
/// catalog-qualified locator falls back to the same relation registered
/// without a catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    relations: HashMap<RelationLocator, Vec<(String, String)>>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a relation.
    pub fn insert<N, T>(&mut self, locator: RelationLocator, columns: impl IntoIterator<Item = (N, T)>)
    where
        N: Into<String>,
        T: Into<String>,
    {
        let columns = columns
            .into_iter()
            .map(|(name, ty)| (name.into(), ty.into()))
            .collect();
        self.relations.insert(locator, columns);
    }

    /// Builder form of [`InMemoryCatalog::insert`].
    pub fn with_relation<N, T>(
        mut self,
        locator: RelationLocator,
        columns: impl IntoIterator<Item = (N, T)>,
    ) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        self.insert(locator, columns);
        self
    }

    /// Number of registered relations.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Load `{"db.table": [{"name": "...", "type": "..."}]}`.
    ///
    /// Returns the number of relations loaded.
    pub fn load_json_str(&mut self, json: &str) -> Result<usize> {
        let parsed: BTreeMap<String, Vec<CatalogColumn>> = serde_json::from_str(json)?;
        let count = parsed.len();
        for (name, columns) in parsed {
            let locator = RelationLocator::parse(&name)?;
            self.insert(
                locator,
                columns.into_iter().map(|c| (c.name, c.data_type)),
            );
        }
        Ok(count)
    }

    /// Load every `CREATE TABLE` in `sql`. Returns the number of relations loaded.
    pub fn load_ddl_str(&mut self, sql: &str) -> Result<usize> {
        let tables = parse_create_tables(sql)?;
        let count = tables.len();
        for table in tables {
            let locator = RelationLocator::from_parts(&table.name_parts).ok_or_else(|| {
                MergeError::Config(format!(
                    "CREATE TABLE {} must name a database",
                    table.name_parts.join(".")
                ))
            })?;
            self.insert(locator, table.columns);
        }
        Ok(count)
    }

    /// Load a `.json` catalog file or a DDL file, chosen by extension.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MergeError::Io(format!("failed to read {}: {e}", path.display())))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let loaded = if is_json {
            self.load_json_str(&content)?
        } else {
            self.load_ddl_str(&content)?
        };
        debug!(path = %path.display(), relations = loaded, "loaded catalog file");
        Ok(loaded)
    }

    fn lookup(&self, locator: &RelationLocator) -> Option<&Vec<(String, String)>> {
        let mut candidates = vec![locator.clone()];
        if locator.catalog().is_some() {
            candidates.push(RelationLocator::new(locator.database(), locator.table()));
        }

        candidates.iter().find_map(|candidate| {
            self.relations.get(candidate).or_else(|| {
                self.relations
                    .iter()
                    .find(|(key, _)| same_relation_ignore_case(key, candidate))
                    .map(|(_, columns)| columns)
            })
        })
    }
}

fn same_relation_ignore_case(a: &RelationLocator, b: &RelationLocator) -> bool {
    let (pa, pb) = (a.parts(), b.parts());
    pa.len() == pb.len() && pa.iter().zip(&pb).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

impl CatalogProvider for InMemoryCatalog {
    fn list_column_types(&self, locator: &RelationLocator) -> Result<Vec<(String, String)>> {
        Ok(self.lookup(locator).cloned().unwrap_or_default())
    }
}
