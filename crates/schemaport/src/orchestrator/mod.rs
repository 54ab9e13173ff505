//! Pipeline coordinator.
//!
//! - [`Orchestrator::export`]: reflect, translate, order and refine into a [`Catalog`]
//! - [`Orchestrator::import`]: apply a catalog to a target, then verify
//! - [`Orchestrator::migrate`]: both, without writing the catalog anywhere
//! - [`Orchestrator::diff`], [`Orchestrator::verify`]: read-only checks
//!
//! Only listing failures and lost connections abort a run. Everything
//! scoped to a single table is recorded and the run moves on.

mod report;

pub use report::{ReflectionFailure, RunReport};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::apply::{ApplyOptions, DdlApplier};
use crate::config::ImportOptions;
use crate::core::catalog::Catalog;
use crate::core::schema::ReflectedTable;
use crate::core::traits::{SchemaReader, TargetExecutor};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::graph::DependencyGraph;
use crate::planner::{Refinement, SchemaPlanner};
use crate::verify::{diff, SchemaVerifier, TableDifferences, VerificationReport};

/// Output of the reflection pass.
#[derive(Debug, Clone)]
pub struct Export {
    /// Ordered, refined working set.
    pub catalog: Catalog,
    pub reflection_failures: Vec<ReflectionFailure>,
    pub refinements: Vec<Refinement>,
}

/// Runs the pipeline with one set of import options.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    options: ImportOptions,
}

impl Orchestrator {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Reflect the working set from `source` and plan it for `target`.
    pub async fn export<S>(&self, source: &mut S, target: Dialect) -> Result<Export>
    where
        S: SchemaReader + ?Sized,
    {
        let source_dialect = source.dialect();
        let prefix = self.options.prefix.as_str();
        info!("Phase 1: Reflecting {} tables matching '{}'", source_dialect, prefix);

        let names = source.list_tables(prefix).await.map_err(|e| match e {
            e @ (SchemaError::SchemaListing(_) | SchemaError::Connection { .. }) => e,
            other => SchemaError::SchemaListing(other.to_string()),
        })?;
        info!("Found {} tables", names.len());

        let mut reflected: Vec<ReflectedTable> = Vec::with_capacity(names.len());
        let mut reflection_failures = Vec::new();
        for name in &names {
            match source.reflect_table(name).await {
                Ok(table) => reflected.push(table),
                Err(e) if e.is_fatal() => {
                    error!("Reflection aborted at {}: {}", name, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{}: omitted from working set: {}", name, e);
                    reflection_failures.push(ReflectionFailure {
                        table: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let naming = self.options.naming_dialect_or(target)?;
        let planner = SchemaPlanner::new(naming, target);
        let descriptors: Vec<_> = reflected.iter().map(|r| planner.describe(r)).collect();

        info!("Phase 2: Ordering {} tables by foreign key", descriptors.len());
        let order = DependencyGraph::build(&descriptors).topological_order();
        let mut catalog = Catalog::new(source_dialect, target, prefix);
        for table in descriptors {
            catalog.insert(table);
        }
        catalog.reorder(&order);

        info!("Phase 3: Refining keys and indexes for {}", target);
        let refinements = catalog
            .tables_mut()
            .iter_mut()
            .map(|t| planner.refine(t))
            .collect();

        Ok(Export {
            catalog,
            reflection_failures,
            refinements,
        })
    }

    /// Apply `catalog` to `target`, then verify when enabled.
    pub async fn import<E>(&self, catalog: &mut Catalog, target: &mut E) -> RunReport
    where
        E: TargetExecutor + ?Sized,
    {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let target_dialect = target.dialect();
        info!("Starting schema run {} against {}", run_id, target_dialect);

        if catalog.target_dialect != target_dialect {
            warn!(
                "Catalog was refined for {} but the target is {}; key size limits may differ",
                catalog.target_dialect, target_dialect
            );
        }

        // Catalog files can be edited by hand, so their order is not trusted.
        let order = DependencyGraph::build(catalog.tables()).topological_order();
        if order != catalog.names() {
            info!("Reordering catalog so referenced tables are created first");
            catalog.reorder(&order);
        }

        let options = ApplyOptions {
            drop_existing: self.options.drop_existing,
            create_indexes: self.options.create_indexes,
        };
        let apply = DdlApplier::new(&mut *target, options)
            .apply(catalog.tables_mut())
            .await;

        let verification = if self.options.verify {
            Some(SchemaVerifier::new(&mut *target).verify(catalog.tables()).await)
        } else {
            None
        };

        let report = RunReport::build(
            run_id,
            started_at,
            Some(catalog.source_dialect),
            target_dialect,
            catalog.len(),
            apply,
            verification,
        );
        info!(
            "Run {} {}: {} created, {} present, {} failed",
            report.run_id, report.status, report.tables_created, report.tables_present, report.tables_failed
        );
        report
    }

    /// Export from `source` and import into `target` in one run.
    pub async fn migrate<S, E>(&self, source: &mut S, target: &mut E) -> Result<RunReport>
    where
        S: SchemaReader + ?Sized,
        E: TargetExecutor + ?Sized,
    {
        let Export {
            mut catalog,
            reflection_failures,
            refinements,
        } = self.export(source, target.dialect()).await?;

        let mut report = self.import(&mut catalog, target).await;
        report.reflection_failures = reflection_failures;
        report.refinements = refinements;
        Ok(report)
    }

    /// Classify the catalog's tables against what the target has.
    pub async fn diff<R>(&self, catalog: &Catalog, target: &mut R) -> Result<TableDifferences>
    where
        R: SchemaReader + ?Sized,
    {
        diff::analyze(target, &catalog.names(), &self.options.prefix).await
    }

    /// Verify the target against the catalog without changing anything.
    pub async fn verify<R>(&self, catalog: &Catalog, target: &mut R) -> VerificationReport
    where
        R: SchemaReader + ?Sized,
    {
        SchemaVerifier::new(target).verify(catalog.tables()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDescriptor, ForeignKeyRef, GenericType, TableDescriptor};
    use crate::drivers::memory::MemoryTarget;

    fn table(name: &str, refs: &[&str]) -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", GenericType::Integer);
        id.primary_key = true;
        id.nullable = false;
        let mut cols = vec![id];
        for r in refs {
            cols.push(ColumnDescriptor::new(format!("{}_id", r), GenericType::Integer));
        }
        let mut t = TableDescriptor::new(name, cols);
        t.sync_primary_key();
        t.foreign_keys = refs
            .iter()
            .map(|r| ForeignKeyRef::new(format!("{}_id", r), *r, "id"))
            .collect();
        t
    }

    #[tokio::test]
    async fn test_export_orders_and_omits_unreadable() {
        let mut source = MemoryTarget::new(Dialect::Mysql);
        source.insert_table(table("t_a_child", &["t_z_parent"]));
        source.insert_table(table("t_z_parent", &[]));
        source.insert_table(table("t_broken", &[]));
        source.insert_table(table("audit", &[]));
        source.mark_unreadable("t_broken");

        let export = Orchestrator::new(ImportOptions::default())
            .export(&mut source, Dialect::Postgres)
            .await
            .unwrap();

        assert_eq!(export.catalog.names(), vec!["t_z_parent", "t_a_child"]);
        assert_eq!(export.reflection_failures.len(), 1);
        assert_eq!(export.reflection_failures[0].table, "t_broken");
        assert_eq!(export.refinements.len(), 2);
        assert_eq!(export.catalog.target_dialect, Dialect::Postgres);
    }

    #[tokio::test]
    async fn test_import_reports_success_and_verifies() {
        let mut catalog = Catalog::new(Dialect::Mysql, Dialect::Mysql, "t_");
        catalog.insert(table("t_parent", &[]));
        catalog.insert(table("t_child", &["t_parent"]));
        let mut target = MemoryTarget::new(Dialect::Mysql);

        let report = Orchestrator::new(ImportOptions::default())
            .import(&mut catalog, &mut target)
            .await;

        assert!(report.success);
        assert_eq!(report.status, "completed");
        assert_eq!(report.tables_created, 2);
        assert!(report.verification.as_ref().unwrap().is_clean());
        let json = report.to_json().unwrap();
        assert!(json.contains("\"run_id\""));
    }

    #[tokio::test]
    async fn test_import_creates_parent_before_listed_child() {
        let mut catalog = Catalog::new(Dialect::Postgres, Dialect::Postgres, "t_");
        catalog.insert(table("t_child", &["t_parent"]));
        catalog.insert(table("t_parent", &[]));
        let mut target = MemoryTarget::new(Dialect::Postgres);

        let report = Orchestrator::new(ImportOptions::default())
            .import(&mut catalog, &mut target)
            .await;

        assert!(report.success);
        assert_eq!(report.apply.created, vec!["t_parent", "t_child"]);
        assert_eq!(catalog.names(), vec!["t_parent", "t_child"]);
        let creates: Vec<&String> = target
            .statements()
            .iter()
            .filter(|s| s.starts_with("CREATE TABLE"))
            .collect();
        assert!(creates[0].contains("\"t_parent\""));
        assert!(creates[1].contains("REFERENCES \"t_parent\""));
    }

    #[tokio::test]
    async fn test_import_failure_is_reported() {
        let mut catalog = Catalog::new(Dialect::Mysql, Dialect::Mysql, "t_");
        catalog.insert(table("t_parent", &[]));
        let mut target = MemoryTarget::new(Dialect::Mysql);
        target.reject_statements_containing("CREATE TABLE");

        let mut options = ImportOptions::default();
        options.verify = false;
        let report = Orchestrator::new(options).import(&mut catalog, &mut target).await;

        assert!(!report.success);
        assert_eq!(report.status, "failed");
        assert_eq!(report.failed_tables, vec!["t_parent"]);
        assert!(report.verification.is_none());
    }

    #[tokio::test]
    async fn test_diff_against_target() {
        let mut catalog = Catalog::new(Dialect::Sqlite, Dialect::Sqlite, "t_");
        catalog.insert(table("t_new", &[]));
        catalog.insert(table("t_kept", &[]));
        let mut target = MemoryTarget::new(Dialect::Sqlite);
        target.insert_table(table("t_kept", &[]));
        target.insert_table(table("t_stale", &[]));

        let diff = Orchestrator::new(ImportOptions::default())
            .diff(&catalog, &mut target)
            .await
            .unwrap();
        assert_eq!(diff.new, vec!["t_new"]);
        assert_eq!(diff.existing, vec!["t_kept"]);
        assert_eq!(diff.orphaned, vec!["t_stale"]);
    }
}
