//! Run-scoped table catalog.
//!
//! The catalog is the single owner of the working set for one run: the
//! reflection pass populates it, refinement mutates it in place, and the
//! applier and verifier consume it. It is also the reviewable artifact:
//! [`Catalog::save`] writes it as JSON and [`Catalog::load`] reconstructs
//! equal descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

use super::schema::TableDescriptor;

/// Artifact format version written by [`Catalog::save`].
pub const CATALOG_FORMAT_VERSION: u32 = 1;

/// Ordered set of table descriptors for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Artifact format version.
    pub format_version: u32,

    /// Dialect the descriptors were reflected from.
    pub source_dialect: Dialect,

    /// Dialect the descriptors were refined for.
    pub target_dialect: Dialect,

    /// Name prefix that defined the working set.
    pub prefix: String,

    /// When the catalog was built.
    pub generated_at: DateTime<Utc>,

    /// Tables, in dependency order once ordering has run.
    tables: Vec<TableDescriptor>,
}

impl Catalog {
    pub fn new(source_dialect: Dialect, target_dialect: Dialect, prefix: impl Into<String>) -> Self {
        Self {
            format_version: CATALOG_FORMAT_VERSION,
            source_dialect,
            target_dialect,
            prefix: prefix.into(),
            generated_at: Utc::now(),
            tables: Vec::new(),
        }
    }

    /// Add a table, replacing any previous table with the same name.
    pub fn insert(&mut self, table: TableDescriptor) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut [TableDescriptor] {
        &mut self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Table names in current order.
    pub fn names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Reorder tables to follow `order`. Names missing from `order` keep
    /// their relative position after the ordered ones.
    pub fn reorder(&mut self, order: &[String]) {
        let mut remaining = std::mem::take(&mut self.tables);
        let mut ordered = Vec::with_capacity(remaining.len());
        for name in order {
            if let Some(pos) = remaining.iter().position(|t| &t.name == name) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        self.tables = ordered;
    }

    /// Load a catalog artifact from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&content)?;

        if catalog.format_version != CATALOG_FORMAT_VERSION {
            return Err(SchemaError::Config(format!(
                "Catalog {} has format version {}, expected {}",
                path.display(),
                catalog.format_version,
                CATALOG_FORMAT_VERSION
            )));
        }

        let mut seen = HashSet::new();
        for table in &catalog.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(SchemaError::Config(format!(
                    "Catalog {} lists table {} more than once",
                    path.display(),
                    table.name
                )));
            }
        }

        debug!("Loaded {} tables from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Save the catalog as pretty JSON (atomic write).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        debug!("Saved {} tables to {}", self.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDescriptor, DefaultValue, ForeignKeyRef, GenericType, IndexDescriptor};
    use tempfile::tempdir;

    fn sample() -> Catalog {
        let mut catalog = Catalog::new(Dialect::Postgres, Dialect::Mysql, "t_");
        let mut id = ColumnDescriptor::new("id", GenericType::BigInteger);
        id.primary_key = true;
        id.nullable = false;
        let mut users = TableDescriptor::new("t_users", vec![id]);
        users.primary_key = vec!["id".into()];
        catalog.insert(users);

        let mut status = ColumnDescriptor::new("status", GenericType::String(20));
        status.default = Some(DefaultValue::Text("new".into()));
        let mut orders = TableDescriptor::new(
            "t_orders",
            vec![ColumnDescriptor::new("user_id", GenericType::BigInteger), status],
        );
        orders.foreign_keys = vec![ForeignKeyRef::new("user_id", "t_users", "id")];
        orders.indexes = vec![IndexDescriptor::new("idx_t_orders_status", vec!["status".into()], false)];
        catalog.insert(orders);
        catalog
    }

    #[test]
    fn test_save_and_load_reconstructs_descriptors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = sample();

        catalog.save(&path).unwrap();
        let loaded = Catalog::load(&path).unwrap();

        assert_eq!(loaded, catalog);
        assert!(!dir.path().join("catalog.tmp").exists());
    }

    #[test]
    fn test_load_rejects_duplicate_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let mut catalog = sample();
        let dup = catalog.tables()[0].clone();
        catalog.tables.push(dup);
        catalog.save(&path).unwrap();

        let err = Catalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let mut catalog = sample();
        catalog.format_version = 99;
        catalog.save(&path).unwrap();

        assert!(Catalog::load(&path).is_err());
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut catalog = sample();
        catalog.insert(TableDescriptor::new("t_users", vec![]));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.table("t_users").unwrap().columns.is_empty());
    }

    #[test]
    fn test_reorder_keeps_unlisted_tables() {
        let mut catalog = sample();
        catalog.insert(TableDescriptor::new("t_audit", vec![]));
        catalog.reorder(&["t_orders".to_string()]);
        assert_eq!(catalog.names(), vec!["t_orders", "t_users", "t_audit"]);
    }
}
