//! Staged DDL application.
//!
//! One run over an ordered descriptor list, on one exclusively borrowed
//! target session:
//!
//! - Phase 0: disable integrity checks, apply bulk session tuning
//! - Phase 1: optional reverse-order drop, then create each bare table
//! - Phase 2: create missing indexes on tables that made it through phase 1
//! - Phase 3: reset tuning, re-enable integrity checks
//!
//! Phase 3 runs even when phases 1-2 panic; the panic resumes afterwards.
//! Per-table and per-index failures are recorded in the [`ApplyReport`] and
//! never stop the loop.

pub mod session;

use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

use crate::core::schema::TableDescriptor;
use crate::core::traits::{Creation, TargetExecutor};

pub use session::StatementWarning;

/// Switches for one apply run.
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Drop existing tables (and their indexes) before creating.
    pub drop_existing: bool,

    /// Run phase 2.
    pub create_indexes: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            drop_existing: false,
            create_indexes: true,
        }
    }
}

/// A table-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub table: String,
    pub error: String,
}

/// An index-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFailure {
    pub table: String,
    pub index: String,
    pub error: String,
}

/// Phase 1 result for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    Created,
    AlreadyPresent,
    Failed(String),
}

/// Everything one apply run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Tables created in phase 1.
    pub created: Vec<String>,

    /// Tables that already existed.
    pub already_present: Vec<String>,

    /// Tables phase 1 could not create.
    pub structural_failures: Vec<ItemFailure>,

    /// Tables dropped before creation.
    pub dropped: Vec<String>,

    /// Drop problems; the table is still attempted in phase 1.
    pub drop_failures: Vec<ItemFailure>,

    pub indexes_created: usize,
    pub indexes_present: usize,
    pub index_failures: Vec<IndexFailure>,

    /// Session toggles the target rejected.
    pub session_warnings: Vec<StatementWarning>,
}

impl ApplyReport {
    /// A run succeeds when every table's structure is in place. Index
    /// failures are reported but do not count against success.
    pub fn success(&self) -> bool {
        self.structural_failures.is_empty()
    }

    /// Whether `table` made it through phase 1.
    pub fn is_structured(&self, table: &str) -> bool {
        self.created.iter().chain(&self.already_present).any(|t| t == table)
    }
}

/// Applies an ordered, refined descriptor list to a target session.
pub struct DdlApplier<'a, E: TargetExecutor + ?Sized> {
    target: &'a mut E,
    options: ApplyOptions,
}

impl<'a, E: TargetExecutor + ?Sized> DdlApplier<'a, E> {
    pub fn new(target: &'a mut E, options: ApplyOptions) -> Self {
        Self { target, options }
    }

    /// Run all four phases. `tables` must already be in dependency order;
    /// their index lists are briefly taken during phase 1 and restored.
    pub async fn apply(&mut self, tables: &mut [TableDescriptor]) -> ApplyReport {
        let mut report = ApplyReport::default();
        let dialect = self.target.dialect();

        info!("Phase 0: preparing {} session", dialect);
        session::enter(self.target, &mut report.session_warnings).await;

        let phases = AssertUnwindSafe(self.run_phases(tables, &mut report))
            .catch_unwind()
            .await;

        info!("Phase 3: restoring {} session", dialect);
        session::leave(self.target, &mut report.session_warnings).await;

        if let Err(panic) = phases {
            std::panic::resume_unwind(panic);
        }

        info!(
            "Apply finished: {} created, {} present, {} failed, {} indexes created, {} index failures",
            report.created.len(),
            report.already_present.len(),
            report.structural_failures.len(),
            report.indexes_created,
            report.index_failures.len()
        );
        report
    }

    async fn run_phases(&mut self, tables: &mut [TableDescriptor], report: &mut ApplyReport) {
        if self.options.drop_existing {
            info!("Phase 1a: dropping {} tables in reverse dependency order", tables.len());
            for table in tables.iter().rev() {
                self.drop_table(&table.name, report).await;
            }
        }

        info!("Phase 1: creating {} tables", tables.len());
        for table in tables.iter_mut() {
            match self.create_structure(table).await {
                TableOutcome::Created => {
                    info!("{}: created", table.name);
                    report.created.push(table.name.clone());
                }
                TableOutcome::AlreadyPresent => {
                    info!("{}: already exists", table.name);
                    report.already_present.push(table.name.clone());
                }
                TableOutcome::Failed(error) => {
                    warn!("{}: create failed: {}", table.name, error);
                    report.structural_failures.push(ItemFailure {
                        table: table.name.clone(),
                        error,
                    });
                }
            }
        }

        if !self.options.create_indexes {
            info!("Phase 2: skipped");
            return;
        }

        info!("Phase 2: creating indexes");
        for table in tables.iter() {
            if !report.is_structured(&table.name) {
                debug!("{}: no structure, skipping indexes", table.name);
                continue;
            }
            self.create_indexes(table, report).await;
        }
    }

    /// Create the bare table with its indexes set aside.
    async fn create_structure(&mut self, table: &mut TableDescriptor) -> TableOutcome {
        let indexes = std::mem::take(&mut table.indexes);
        let result = self.target.create_table(table).await;
        table.indexes = indexes;

        match result {
            Ok(Creation::Created) => TableOutcome::Created,
            Ok(Creation::AlreadyExists) => TableOutcome::AlreadyPresent,
            Err(e) => TableOutcome::Failed(e.to_string()),
        }
    }

    async fn create_indexes(&mut self, table: &TableDescriptor, report: &mut ApplyReport) {
        if table.indexes.is_empty() {
            return;
        }

        let existing = match self.target.get_indexes(&table.name).await {
            Ok(found) => found,
            Err(e) => {
                debug!("{}: index lookup failed, assuming none: {}", table.name, e);
                Vec::new()
            }
        };

        for index in &table.indexes {
            if existing.iter().any(|e| e.name.eq_ignore_ascii_case(&index.name)) {
                debug!("{}: index {} already exists", table.name, index.name);
                report.indexes_present += 1;
                continue;
            }
            match self.target.create_index(table, index).await {
                Ok(()) => {
                    debug!("{}: created index {}", table.name, index.name);
                    report.indexes_created += 1;
                }
                Err(e) => {
                    warn!("{}: failed to create index {}: {}", table.name, index.name, e);
                    report.index_failures.push(IndexFailure {
                        table: table.name.clone(),
                        index: index.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Drop one table's indexes, then the table. Problems are recorded and
    /// phase 1 still attempts the table.
    async fn drop_table(&mut self, name: &str, report: &mut ApplyReport) {
        match self.target.has_table(name).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                report.drop_failures.push(ItemFailure {
                    table: name.to_string(),
                    error: e.to_string(),
                });
                return;
            }
        }

        match self.target.get_indexes(name).await {
            Ok(indexes) => {
                for index in indexes {
                    if let Err(e) = self.target.drop_index(name, &index.name).await {
                        warn!("{}: failed to drop index {}: {}", name, index.name, e);
                        report.drop_failures.push(ItemFailure {
                            table: name.to_string(),
                            error: format!("index {}: {}", index.name, e),
                        });
                    }
                }
            }
            Err(e) => debug!("{}: index lookup before drop failed: {}", name, e),
        }

        match self.target.drop_table(name).await {
            Ok(true) => {
                info!("{}: dropped", name);
                report.dropped.push(name.to_string());
            }
            Ok(false) => {}
            Err(e) => {
                warn!("{}: drop failed: {}", name, e);
                report.drop_failures.push(ItemFailure {
                    table: name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDescriptor, ForeignKeyRef, GenericType, IndexDescriptor};
    use crate::dialect::Dialect;
    use crate::drivers::memory::MemoryTarget;

    fn table(name: &str, refs: &[&str]) -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", GenericType::Integer);
        id.primary_key = true;
        id.nullable = false;
        let mut cols = vec![id, ColumnDescriptor::new("status", GenericType::String(20))];
        for r in refs {
            cols.push(ColumnDescriptor::new(format!("{}_id", r), GenericType::Integer));
        }
        let mut t = TableDescriptor::new(name, cols);
        t.sync_primary_key();
        t.foreign_keys = refs
            .iter()
            .map(|r| ForeignKeyRef::new(format!("{}_id", r), *r, "id"))
            .collect();
        t.indexes = vec![IndexDescriptor::new(
            format!("idx_{}_status", name),
            vec!["status".into()],
            false,
        )];
        t
    }

    #[tokio::test]
    async fn test_all_phases_succeed() {
        let mut target = MemoryTarget::new(Dialect::Postgres);
        let mut tables = vec![table("t_a", &[]), table("t_b", &["t_a"])];

        let report = DdlApplier::new(&mut target, ApplyOptions::default())
            .apply(&mut tables)
            .await;

        assert!(report.success());
        assert_eq!(report.created, vec!["t_a", "t_b"]);
        assert_eq!(report.indexes_created, 2);
        assert_eq!(tables[0].indexes.len(), 1);
        assert!(target.table("t_b").is_some());
    }

    #[tokio::test]
    async fn test_failed_table_skips_indexes_and_later_tables_continue() {
        let mut target = MemoryTarget::new(Dialect::Postgres);
        target.reject_statements_containing("CREATE TABLE IF NOT EXISTS \"t_b\"");
        let mut tables = vec![table("t_a", &[]), table("t_b", &[]), table("t_c", &[])];

        let report = DdlApplier::new(&mut target, ApplyOptions::default())
            .apply(&mut tables)
            .await;

        assert!(!report.success());
        assert_eq!(report.structural_failures.len(), 1);
        assert_eq!(report.structural_failures[0].table, "t_b");
        assert_eq!(report.created, vec!["t_a", "t_c"]);
        assert_eq!(report.indexes_created, 2);
        assert!(!target.statements().iter().any(|s| s.contains("idx_t_b_status")));
        assert_eq!(tables[1].indexes.len(), 1);
    }

    #[tokio::test]
    async fn test_index_failure_does_not_flip_success() {
        let mut target = MemoryTarget::new(Dialect::Mysql);
        target.reject_statements_containing("idx_t_a_status");
        let mut tables = vec![table("t_a", &[]), table("t_b", &[])];

        let report = DdlApplier::new(&mut target, ApplyOptions::default())
            .apply(&mut tables)
            .await;

        assert!(report.success());
        assert_eq!(report.index_failures.len(), 1);
        assert_eq!(report.indexes_created, 1);
    }

    #[tokio::test]
    async fn test_existing_index_is_not_recreated() {
        let mut target = MemoryTarget::new(Dialect::Postgres);
        target.insert_table(table("t_a", &[]));
        let mut tables = vec![table("t_a", &[])];

        let report = DdlApplier::new(&mut target, ApplyOptions::default())
            .apply(&mut tables)
            .await;

        assert_eq!(report.already_present, vec!["t_a"]);
        assert_eq!(report.indexes_present, 1);
        assert_eq!(report.indexes_created, 0);
    }

    #[tokio::test]
    async fn test_session_toggles_bracket_the_run() {
        let mut target = MemoryTarget::new(Dialect::Mysql);
        target.reject_statements_containing("CREATE TABLE");
        let mut tables = vec![table("t_a", &[])];

        DdlApplier::new(&mut target, ApplyOptions::default())
            .apply(&mut tables)
            .await;

        let stmts = target.statements();
        assert_eq!(stmts.first().map(String::as_str), Some("SET FOREIGN_KEY_CHECKS = 0"));
        assert_eq!(stmts.last().map(String::as_str), Some("SET FOREIGN_KEY_CHECKS = 1"));
        let reset = stmts.iter().position(|s| s == "SET UNIQUE_CHECKS = 1").unwrap();
        let tuned = stmts.iter().position(|s| s == "SET UNIQUE_CHECKS = 0").unwrap();
        assert!(tuned < reset);
    }

    #[tokio::test]
    async fn test_rejected_toggle_is_a_warning() {
        let mut target = MemoryTarget::new(Dialect::Oracle);
        target.reject_statements_containing("CONSTRAINT_CHECK");
        let mut tables = vec![table("t_a", &[])];

        let report = DdlApplier::new(&mut target, ApplyOptions::default())
            .apply(&mut tables)
            .await;

        assert!(report.success());
        assert_eq!(report.session_warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_postgres_has_no_toggles() {
        let mut target = MemoryTarget::new(Dialect::Postgres);
        let mut tables = vec![table("t_a", &[])];
        DdlApplier::new(&mut target, ApplyOptions::default())
            .apply(&mut tables)
            .await;
        assert!(target.statements()[0].starts_with("CREATE TABLE"));
    }

    #[tokio::test]
    async fn test_drop_existing_in_reverse_order() {
        let mut target = MemoryTarget::new(Dialect::Mysql);
        target.insert_table(table("t_parent", &[]));
        target.insert_table(table("t_child", &["t_parent"]));
        let mut tables = vec![table("t_parent", &[]), table("t_child", &["t_parent"])];

        let report = DdlApplier::new(
            &mut target,
            ApplyOptions {
                drop_existing: true,
                create_indexes: true,
            },
        )
        .apply(&mut tables)
        .await;

        assert_eq!(report.dropped, vec!["t_child", "t_parent"]);
        assert_eq!(report.created, vec!["t_parent", "t_child"]);
        let stmts = target.statements();
        let drop_idx = stmts.iter().position(|s| s.starts_with("DROP INDEX `idx_t_child_status`")).unwrap();
        let drop_tbl = stmts.iter().position(|s| s == "DROP TABLE `t_child`").unwrap();
        assert!(drop_idx < drop_tbl);
    }

    #[tokio::test]
    async fn test_session_released_after_panic() {
        use crate::core::schema::ReflectedColumn;
        use crate::core::traits::SchemaReader;
        use crate::error::Result;
        use async_trait::async_trait;

        struct Exploding(MemoryTarget);

        #[async_trait]
        impl SchemaReader for Exploding {
            fn dialect(&self) -> Dialect {
                self.0.dialect()
            }
            async fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>> {
                self.0.list_tables(prefix).await
            }
            async fn has_table(&mut self, _table: &str) -> Result<bool> {
                panic!("connection torn down");
            }
            async fn get_columns(&mut self, table: &str) -> Result<Vec<ReflectedColumn>> {
                self.0.get_columns(table).await
            }
            async fn get_primary_key(&mut self, table: &str) -> Result<Vec<String>> {
                self.0.get_primary_key(table).await
            }
            async fn get_foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRef>> {
                self.0.get_foreign_keys(table).await
            }
            async fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>> {
                self.0.get_indexes(table).await
            }
        }

        #[async_trait]
        impl TargetExecutor for Exploding {
            async fn execute(&mut self, sql: &str) -> Result<()> {
                self.0.execute(sql).await
            }
        }

        let mut target = Exploding(MemoryTarget::new(Dialect::Mysql));
        let mut tables = vec![table("t_a", &[])];
        let outcome = AssertUnwindSafe(async {
            DdlApplier::new(&mut target, ApplyOptions::default())
                .apply(&mut tables)
                .await
        })
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(
            target.0.statements().last().map(String::as_str),
            Some("SET FOREIGN_KEY_CHECKS = 1")
        );
    }
}
