//! Collaborator interfaces for source introspection and target execution.
//!
//! - [`SchemaReader`]: answers metadata queries about one database session
//! - [`TargetExecutor`]: a [`SchemaReader`] that can also run statements
//!
//! Both take `&mut self`. A session toggle (foreign key checks, autocommit)
//! only affects the connection it was issued on, so every driver owns a
//! single connection rather than a pool.
//!
//! The DDL operations on [`TargetExecutor`] are template methods: drivers
//! only implement [`TargetExecutor::execute`] and the metadata queries, and
//! the defaults render dialect SQL and check existence first.

use async_trait::async_trait;

use crate::dialect::{ddl, Dialect};
use crate::error::{Result, SchemaError};

use super::schema::{
    ForeignKeyRef, IndexDescriptor, ReflectedColumn, ReflectedTable, TableDescriptor,
};

/// Outcome of a create-if-not-exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Created,
    AlreadyExists,
}

/// Metadata queries against one database session.
#[async_trait]
pub trait SchemaReader: Send {
    /// Dialect spoken by this session.
    fn dialect(&self) -> Dialect;

    /// Base tables whose names start with `prefix`, sorted by name.
    async fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>>;

    async fn has_table(&mut self, table: &str) -> Result<bool>;

    /// Columns in declaration order. `primary_key` flags may be unset;
    /// [`SchemaReader::reflect_table`] fills them from `get_primary_key`.
    async fn get_columns(&mut self, table: &str) -> Result<Vec<ReflectedColumn>>;

    /// Primary key columns in key order.
    async fn get_primary_key(&mut self, table: &str) -> Result<Vec<String>>;

    async fn get_foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRef>>;

    /// Secondary indexes. The primary-key index is never included.
    async fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>>;

    /// Reflect everything known about one table.
    ///
    /// Any query failure is reported as [`SchemaError::Introspection`] for
    /// this table so the caller can drop it from the working set.
    async fn reflect_table(&mut self, table: &str) -> Result<ReflectedTable> {
        let wrap = |e: SchemaError| match e {
            e @ SchemaError::Introspection { .. } => e,
            other => SchemaError::introspection(table, other.to_string()),
        };

        let mut columns = self.get_columns(table).await.map_err(wrap)?;
        if columns.is_empty() {
            return Err(SchemaError::introspection(table, "table has no columns or does not exist"));
        }
        let mut primary_key = self.get_primary_key(table).await.map_err(wrap)?;
        primary_key.retain(|name| columns.iter().any(|c| &c.name == name));
        for col in &mut columns {
            if primary_key.contains(&col.name) {
                col.primary_key = true;
            }
        }
        let foreign_keys = self.get_foreign_keys(table).await.map_err(wrap)?;
        let indexes = self.get_indexes(table).await.map_err(wrap)?;

        Ok(ReflectedTable {
            name: table.to_string(),
            columns,
            primary_key,
            foreign_keys,
            indexes,
        })
    }
}

/// Statement execution against the target session.
#[async_trait]
pub trait TargetExecutor: SchemaReader {
    /// Run one statement verbatim.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Create the bare table unless it already exists. Only columns, the
    /// primary key and foreign keys are rendered.
    async fn create_table(&mut self, table: &TableDescriptor) -> Result<Creation> {
        if self.has_table(&table.name).await? {
            return Ok(Creation::AlreadyExists);
        }
        let sql = ddl::create_table_sql(self.dialect(), table)?;
        self.execute(&sql).await?;
        Ok(Creation::Created)
    }

    async fn create_index(&mut self, table: &TableDescriptor, index: &IndexDescriptor) -> Result<()> {
        let sql = ddl::create_index_sql(self.dialect(), table, index)?;
        self.execute(&sql).await
    }

    /// Drop the table if it exists. Returns whether anything was dropped.
    async fn drop_table(&mut self, table: &str) -> Result<bool> {
        if !self.has_table(table).await? {
            return Ok(false);
        }
        let sql = ddl::drop_table_sql(self.dialect(), table)?;
        self.execute(&sql).await?;
        Ok(true)
    }

    async fn drop_index(&mut self, table: &str, index: &str) -> Result<()> {
        let sql = ddl::drop_index_sql(self.dialect(), table, index)?;
        self.execute(&sql).await
    }
}
