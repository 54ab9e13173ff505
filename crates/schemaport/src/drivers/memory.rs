//! In-memory target.
//!
//! Models tables and indexes from the descriptors it is asked to create and
//! records every statement it would have sent. Backs `--dry-run`, and lets
//! the pipeline be exercised without a database.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use crate::core::schema::{
    ForeignKeyRef, IndexDescriptor, ReflectedColumn, TableDescriptor,
};
use crate::core::traits::{Creation, SchemaReader, TargetExecutor};
use crate::dialect::{ddl, native_type, Dialect};
use crate::error::{Result, SchemaError};

/// A schema that lives only in memory.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    dialect: Dialect,
    tables: BTreeMap<String, TableDescriptor>,
    statements: Vec<String>,
    rejected: Vec<String>,
    unreadable: HashSet<String>,
}

impl MemoryTarget {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: BTreeMap::new(),
            statements: Vec::new(),
            rejected: Vec::new(),
            unreadable: HashSet::new(),
        }
    }

    /// Seed a table (with its indexes) as if it already existed.
    pub fn insert_table(&mut self, table: TableDescriptor) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Every statement executed so far, rejected ones included.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Make statements containing `fragment` fail, the way an engine
    /// rejecting them would.
    pub fn reject_statements_containing(&mut self, fragment: impl Into<String>) {
        self.rejected.push(fragment.into());
    }

    /// Make reflection of `table` fail.
    pub fn mark_unreadable(&mut self, table: impl Into<String>) {
        self.unreadable.insert(table.into());
    }

    fn lookup(&self, table: &str) -> Result<&TableDescriptor> {
        if self.unreadable.contains(table) {
            return Err(SchemaError::introspection(table, "permission denied"));
        }
        self.tables
            .get(table)
            .ok_or_else(|| SchemaError::introspection(table, "no such table"))
    }
}

#[async_trait]
impl SchemaReader for MemoryTarget {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn has_table(&mut self, table: &str) -> Result<bool> {
        Ok(self.tables.contains_key(table))
    }

    async fn get_columns(&mut self, table: &str) -> Result<Vec<ReflectedColumn>> {
        let dialect = self.dialect;
        let t = self.lookup(table)?;
        Ok(t.columns
            .iter()
            .map(|c| ReflectedColumn {
                name: c.name.clone(),
                native_type: native_type(dialect, &c.data_type),
                nullable: c.nullable,
                default: c.default.as_ref().map(|d| d.to_string()),
                primary_key: c.primary_key,
                autoincrement: c.autoincrement,
            })
            .collect())
    }

    async fn get_primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self.lookup(table)?.primary_key.clone())
    }

    async fn get_foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRef>> {
        Ok(self.lookup(table)?.foreign_keys.clone())
    }

    async fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>> {
        Ok(self.lookup(table)?.indexes.clone())
    }
}

#[async_trait]
impl TargetExecutor for MemoryTarget {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("memory: {}", sql);
        self.statements.push(sql.to_string());
        if let Some(fragment) = self.rejected.iter().find(|f| sql.contains(f.as_str())) {
            return Err(SchemaError::execution(
                sql,
                format!("rejected statement containing '{}'", fragment),
            ));
        }
        Ok(())
    }

    async fn create_table(&mut self, table: &TableDescriptor) -> Result<Creation> {
        if self.tables.contains_key(&table.name) {
            return Ok(Creation::AlreadyExists);
        }
        let sql = ddl::create_table_sql(self.dialect, table)?;
        self.execute(&sql).await?;
        let mut bare = table.clone();
        bare.indexes.clear();
        self.tables.insert(bare.name.clone(), bare);
        Ok(Creation::Created)
    }

    async fn create_index(&mut self, table: &TableDescriptor, index: &IndexDescriptor) -> Result<()> {
        let sql = ddl::create_index_sql(self.dialect, table, index)?;
        let Some(existing) = self.tables.get(&table.name) else {
            return Err(SchemaError::execution(sql, format!("table {} does not exist", table.name)));
        };
        if existing.indexes.iter().any(|i| i.name == index.name) {
            return Err(SchemaError::execution(sql, format!("index {} already exists", index.name)));
        }
        self.execute(&sql).await?;
        if let Some(t) = self.tables.get_mut(&table.name) {
            t.indexes.push(index.clone());
        }
        Ok(())
    }

    async fn drop_table(&mut self, table: &str) -> Result<bool> {
        if !self.tables.contains_key(table) {
            return Ok(false);
        }
        let sql = ddl::drop_table_sql(self.dialect, table)?;
        self.execute(&sql).await?;
        self.tables.remove(table);
        Ok(true)
    }

    async fn drop_index(&mut self, table: &str, index: &str) -> Result<()> {
        let sql = ddl::drop_index_sql(self.dialect, table, index)?;
        self.execute(&sql).await?;
        if let Some(t) = self.tables.get_mut(table) {
            t.indexes.retain(|i| i.name != index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDescriptor, GenericType};

    fn users() -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", GenericType::BigInteger);
        id.primary_key = true;
        id.nullable = false;
        let mut t = TableDescriptor::new(
            "t_users",
            vec![id, ColumnDescriptor::new("email", GenericType::String(320))],
        );
        t.sync_primary_key();
        t.indexes = vec![IndexDescriptor::new("ux_email", vec!["email".into()], true)];
        t
    }

    #[tokio::test]
    async fn test_create_models_bare_table() {
        let mut target = MemoryTarget::new(Dialect::Postgres);
        assert_eq!(target.create_table(&users()).await.unwrap(), Creation::Created);
        assert_eq!(target.create_table(&users()).await.unwrap(), Creation::AlreadyExists);
        assert!(target.get_indexes("t_users").await.unwrap().is_empty());
        assert_eq!(target.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_reflection_round_trip() {
        let mut target = MemoryTarget::new(Dialect::Mysql);
        target.insert_table(users());
        let reflected = target.reflect_table("t_users").await.unwrap();
        assert_eq!(reflected.columns[1].native_type, "VARCHAR(320)");
        assert!(reflected.columns[0].primary_key);
        assert_eq!(reflected.indexes.len(), 1);
    }

    #[tokio::test]
    async fn test_list_tables_filters_prefix() {
        let mut target = MemoryTarget::new(Dialect::Sqlite);
        target.insert_table(users());
        target.insert_table(TableDescriptor::new("audit", vec![]));
        assert_eq!(target.list_tables("t_").await.unwrap(), vec!["t_users"]);
    }

    #[tokio::test]
    async fn test_unreadable_and_rejected() {
        let mut target = MemoryTarget::new(Dialect::Mysql);
        target.insert_table(users());
        target.mark_unreadable("t_users");
        assert!(matches!(
            target.reflect_table("t_users").await,
            Err(SchemaError::Introspection { .. })
        ));

        target.reject_statements_containing("FOREIGN_KEY_CHECKS");
        assert!(target.execute("SET FOREIGN_KEY_CHECKS = 0").await.is_err());
        assert!(target.execute("SET UNIQUE_CHECKS = 0").await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_index_then_table() {
        let mut target = MemoryTarget::new(Dialect::Mysql);
        target.insert_table(users());
        target.drop_index("t_users", "ux_email").await.unwrap();
        assert!(target.table("t_users").unwrap().indexes.is_empty());
        assert!(target.drop_table("t_users").await.unwrap());
        assert!(!target.drop_table("t_users").await.unwrap());
        assert_eq!(
            target.statements(),
            &["DROP INDEX `ux_email` ON `t_users`", "DROP TABLE `t_users`"]
        );
    }
}
